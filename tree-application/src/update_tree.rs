//! 更新树木记录并投递核验事件（UpdateTree）
//!
//! 流程：
//! 1. 以读已提交隔离级别开启事务；
//! 2. 事务内读取记录的更新前状态；
//! 3. 判定核验状态变迁，若成立则在同一事务内写入 `raised` 状态的事件；
//! 4. 同一事务内应用部分更新；
//! 5. 提交，任一步失败均回滚并向调用方返回错误；
//! 6. 提交成功后投递事件，确认后将事件状态置为 `sent`。投递失败只记录日志，
//!    事件保持 `raised`，由外部对账任务处理。
//!
//! 并发更新同一记录时，两个请求可能读到相同的更新前状态并各自产生事件，
//! 此处不加锁。
//!
use crate::{
    command::Command, command_handler::CommandHandler, config::AppConfig, context::AppContext,
    error::AppError,
};
use async_trait::async_trait;
use bon::Builder;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tree_domain::{
    domain_event::{CaptureVerified, DomainEventRecord, EventStatus},
    entity::Entity,
    eventing::EventBus,
    persist::{DomainEventRepository, IsolationLevel, TransactionManager, TreeRepository},
    tree::{TreeId, TreeRecord, TreeUpdate, VerificationTransition},
};
use uuid::Uuid;

/// 更新树木记录
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTree {
    pub id: TreeId,
    pub update: TreeUpdate,
}

impl Command for UpdateTree {
    const NAME: &'static str = "UpdateTree";

    type Output = UpdateTreeOutcome;
}

/// 本次更新产生的事件及其最终投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaisedEvent {
    pub id: Uuid,
    pub status: EventStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTreeOutcome {
    /// 更新后的记录
    pub tree: TreeRecord,
    pub event: Option<RaisedEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationSettings {
    /// 关闭时不产生也不投递任何核验事件
    pub publishing_enabled: bool,
}

impl From<&AppConfig> for VerificationSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            publishing_enabled: config.enable_verification_publishing,
        }
    }
}

/// `UpdateTree` 的处理器，依赖以显式参数注入，便于替换为测试替身。
#[derive(Builder)]
pub struct UpdateTreeHandler<M>
where
    M: TransactionManager + 'static,
{
    transactions: Arc<M>,
    trees: Arc<dyn TreeRepository<M::Tx>>,
    events: Arc<dyn DomainEventRepository<M::Tx>>,
    event_bus: Arc<dyn EventBus>,
    #[builder(default)]
    settings: VerificationSettings,
}

impl<M> UpdateTreeHandler<M>
where
    M: TransactionManager + 'static,
{
    #[tracing::instrument(
        skip_all,
        fields(
            command = UpdateTree::NAME,
            tree_id = %cmd.id,
            correlation_id = ctx.correlation_id(),
            actor_id = ctx.actor_id(),
        )
    )]
    async fn run(&self, ctx: &AppContext, cmd: UpdateTree) -> Result<UpdateTreeOutcome, AppError> {
        let UpdateTree { id, update } = cmd;

        let mut tx = self
            .transactions
            .begin(IsolationLevel::ReadCommitted)
            .await
            .map_err(|source| AppError::Load { source })?;

        let (tree, raised) = match self.stage(&mut tx, id, &update).await {
            Ok(staged) => staged,
            Err(err) => {
                error!(error = %err, "update aborted, rolling back");
                if let Err(rollback_err) = self.transactions.rollback(tx).await {
                    error!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };

        // 提交失败时句柄已被消费，存储层负责丢弃未提交的写入
        self.transactions.commit(tx).await.map_err(|source| {
            error!(error = %source, "commit failed");
            AppError::Write { source }
        })?;
        debug!(raised = raised.is_some(), "tree update committed");

        let event = match raised {
            Some(record) => Some(self.publish(record).await),
            None => None,
        };

        Ok(UpdateTreeOutcome { tree, event })
    }

    /// 事务内的读取、事件写入与记录更新
    async fn stage(
        &self,
        tx: &mut M::Tx,
        id: TreeId,
        update: &TreeUpdate,
    ) -> Result<(TreeRecord, Option<DomainEventRecord>), AppError> {
        let stored = self
            .trees
            .find_by_id(tx, id)
            .await
            .map_err(|source| AppError::Load { source })?
            .ok_or(AppError::TreeNotFound(id))?;

        let now = Utc::now();
        let transition = if self.settings.publishing_enabled {
            VerificationTransition::detect(&stored, update)
        } else {
            None
        };

        let raised = match transition {
            Some(transition) => {
                let event = CaptureVerified::new(&stored, update, transition, now);
                let record =
                    DomainEventRecord::raise(&event).map_err(|source| AppError::Write { source })?;
                self.events
                    .create(tx, &record)
                    .await
                    .map_err(|source| AppError::Write { source })?;
                info!(event_id = %record.id(), ?transition, "capture verification event raised");
                Some(record)
            }
            None => None,
        };

        self.trees
            .apply_update(tx, id, update, now)
            .await
            .map_err(|source| AppError::Write { source })?;

        let mut tree = stored;
        tree.apply(update, now);
        Ok((tree, raised))
    }

    /// 提交后投递；任何失败都不向调用方传播
    async fn publish(&self, record: DomainEventRecord) -> RaisedEvent {
        let id = *record.id();

        if let Err(err) = self.event_bus.publish(&record).await {
            warn!(event_id = %id, error = %err, "publish failed, event stays raised");
            return RaisedEvent {
                id,
                status: EventStatus::Raised,
            };
        }

        match self
            .events
            .update_status(id, EventStatus::Sent, Utc::now())
            .await
        {
            Ok(()) => {
                debug!(event_id = %id, "event acknowledged and marked sent");
                RaisedEvent {
                    id,
                    status: EventStatus::Sent,
                }
            }
            Err(err) => {
                warn!(event_id = %id, error = %err, "event published but status update failed");
                RaisedEvent {
                    id,
                    status: EventStatus::Raised,
                }
            }
        }
    }
}

#[async_trait]
impl<M> CommandHandler<UpdateTree> for UpdateTreeHandler<M>
where
    M: TransactionManager + 'static,
{
    async fn handle(&self, ctx: &AppContext, cmd: UpdateTree) -> Result<UpdateTreeOutcome, AppError> {
        self.run(ctx, cmd).await
    }
}
