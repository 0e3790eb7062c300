//! Postgres 存储实现（`infra-sqlx` 特性）
//!
//! 表结构约定：
//! - `trees(id, uuid, active, approved, rejection_reason, planter_id,
//!   planting_organization_id, species_id, time_created, time_updated)`
//! - `domain_event(id, payload jsonb, status, created_at, updated_at)`
//! - `tree_tag(tree_id, tag_id)`、`planter(id, organization_id)` 与
//!   `getEntityRelationshipChildren(org_id)` 供过滤条件使用
//!
use crate::{
    domain_event::{DomainEventRecord, EventStatus},
    entity::Entity,
    error::DomainResult as Result,
    persist::{
        DomainEventRepository, FilterSql, FilterValue, IsolationLevel, TransactionManager,
        TreeFilter, TreeQueryRepository, TreeRepository,
    },
    tree::{TreeId, TreeRecord, TreeUpdate},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

type PgTx = Transaction<'static, Postgres>;

fn tree_from_row(row: &PgRow) -> std::result::Result<TreeRecord, sqlx::Error> {
    Ok(TreeRecord::builder()
        .id(TreeId::new(row.try_get("id")?))
        .uuid(row.try_get("uuid")?)
        .active(row.try_get("active")?)
        .maybe_approved(row.try_get("approved")?)
        .maybe_rejection_reason(row.try_get::<Option<String>, _>("rejection_reason")?)
        .maybe_planter_id(row.try_get("planter_id")?)
        .maybe_planting_organization_id(row.try_get("planting_organization_id")?)
        .maybe_species_id(row.try_get("species_id")?)
        .time_created(row.try_get("time_created")?)
        .time_updated(row.try_get("time_updated")?)
        .build())
}

fn event_from_row(row: &PgRow) -> Result<DomainEventRecord> {
    let status: String = row.try_get("status")?;

    Ok(DomainEventRecord::builder()
        .id(row.try_get("id")?)
        .payload(row.try_get("payload")?)
        .status(status.parse::<EventStatus>()?)
        .created_at(row.try_get("created_at")?)
        .updated_at(row.try_get("updated_at")?)
        .build())
}

fn bind_filter<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: &[FilterValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in binds {
        query = match *value {
            FilterValue::Int(v) => query.bind(v),
            FilterValue::Bool(v) => query.bind(v),
        };
    }
    query
}

/// 基于连接池的事务管理器
#[derive(Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    type Tx = PgTx;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx> {
        let mut tx = self.pool.begin().await?;
        // 必须是事务内的第一条语句
        sqlx::query(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            isolation.as_sql()
        ))
        .execute(&mut *tx)
        .await?;
        debug!(%isolation, "begin postgres transaction");
        Ok(tx)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<()> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        tx.rollback().await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct PgTreeRepository;

#[async_trait]
impl TreeRepository<PgTx> for PgTreeRepository {
    async fn find_by_id(&self, tx: &mut PgTx, id: TreeId) -> Result<Option<TreeRecord>> {
        let row = sqlx::query("SELECT * FROM trees WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&mut **tx)
            .await?;

        Ok(row.as_ref().map(tree_from_row).transpose()?)
    }

    async fn apply_update(
        &self,
        tx: &mut PgTx,
        id: TreeId,
        update: &TreeUpdate,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE trees SET time_updated = ");
        qb.push_bind(at);
        if let Some(active) = update.active {
            qb.push(", active = ").push_bind(active);
        }
        if let Some(approved) = update.approved {
            qb.push(", approved = ").push_bind(approved);
        }
        if let Some(reason) = &update.rejection_reason {
            qb.push(", rejection_reason = ").push_bind(reason.clone());
        }
        if let Some(species_id) = update.species_id {
            qb.push(", species_id = ").push_bind(species_id);
        }
        qb.push(" WHERE id = ").push_bind(id.value());

        let done = qb.build().execute(&mut **tx).await?;
        if done.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }
}

/// 事件日志仓储：`create` 走调用方事务，`update_status` 直接使用连接池
#[derive(Clone)]
pub struct PgDomainEventRepository {
    pool: PgPool,
}

impl PgDomainEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DomainEventRepository<PgTx> for PgDomainEventRepository {
    async fn create(&self, tx: &mut PgTx, event: &DomainEventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO domain_event (id, payload, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*event.id())
        .bind(event.payload())
        .bind(event.status().as_str())
        .bind(event.created_at())
        .bind(event.updated_at())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: EventStatus, at: DateTime<Utc>) -> Result<()> {
        let done = sqlx::query("UPDATE domain_event SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<DomainEventRecord>> {
        let row = sqlx::query("SELECT * FROM domain_event WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }
}

/// 只读查询仓储：执行 `TreeFilter` 翻译出的 SQL
#[derive(Clone)]
pub struct PgTreeQueryRepository {
    pool: PgPool,
}

impl PgTreeQueryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TreeQueryRepository for PgTreeQueryRepository {
    async fn find(&self, filter: &TreeFilter) -> Result<Vec<TreeRecord>> {
        let FilterSql { sql, binds } = filter.select_sql();
        let rows = bind_filter(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(tree_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn count(&self, filter: &TreeFilter) -> Result<u64> {
        let FilterSql { sql, binds } = filter.count_sql();
        let row = bind_filter(sqlx::query(&sql), &binds)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get(0)?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn get(&self, id: TreeId) -> Result<Option<TreeRecord>> {
        let row = sqlx::query("SELECT * FROM trees WHERE id = $1")
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(tree_from_row).transpose()?)
    }
}
