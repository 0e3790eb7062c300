//! 内存版存储（InMemoryTreeStore）
//!
//! 同时实现 `TransactionManager`、`TreeRepository`、`DomainEventRepository`
//! 与 `TreeQueryRepository`，用于测试、示例与本地开发：
//! - 事务内写入先暂存在 `InMemoryTx`：记录更新以部分更新操作的形式暂存，
//!   提交时逐条重放到提交时刻的已提交行上（与 `UPDATE ... SET` 只改动给定列一致），
//!   回滚或丢弃句柄即放弃全部暂存写入；
//! - 读取遵循读已提交：可见已提交数据，再叠加本事务自身的暂存更新；
//! - 提供故障注入开关，便于验证回滚与投递失败路径。

use crate::{
    domain_event::{DomainEventRecord, EventStatus},
    entity::Entity,
    error::{DomainError, DomainResult as Result},
    persist::{
        DomainEventRepository, IsolationLevel, SortDirection, TagFilter, TransactionManager,
        TreeFilter, TreeQueryRepository, TreeRepository, TreeSortField,
    },
    tree::{TreeId, TreeRecord, TreeUpdate},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// 以实体标识为键的内存表
struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<E: Entity> Table<E> {
    fn get(&self, id: &E::Id) -> Option<&E> {
        self.rows.get(id)
    }

    fn require(&self, id: &E::Id) -> Result<&E> {
        self.rows
            .get(id)
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", E::TYPE)))
    }

    fn require_mut(&mut self, id: &E::Id) -> Result<&mut E> {
        self.rows
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("{} {id}", E::TYPE)))
    }

    fn contains(&self, id: &E::Id) -> bool {
        self.rows.contains_key(id)
    }

    fn upsert(&mut self, row: E) {
        self.rows.insert(row.id().clone(), row);
    }

    fn values(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.rows.drain().map(|(_, row)| row)
    }
}

#[derive(Default)]
struct State {
    trees: Table<TreeRecord>,
    events: Table<DomainEventRecord>,
    tree_tags: HashMap<TreeId, HashSet<i64>>,
    planter_organizations: HashMap<i64, i64>,
    organization_parents: HashMap<i64, i64>,
}

impl State {
    /// `organization_id` 是否为 `root` 本身或其下级组织
    fn within_organization(&self, organization_id: i64, root: i64) -> bool {
        let mut current = Some(organization_id);
        let mut seen = HashSet::new();
        while let Some(org) = current {
            if org == root {
                return true;
            }
            if !seen.insert(org) {
                return false;
            }
            current = self.organization_parents.get(&org).copied();
        }
        false
    }

    fn matches(&self, tree: &TreeRecord, filter: &TreeFilter) -> bool {
        let tags = self.tree_tags.get(tree.id());
        let tag_ok = match filter.tag {
            Some(TagFilter::Tagged(tag_id)) => tags.is_some_and(|t| t.contains(&tag_id)),
            Some(TagFilter::Untagged) => tags.is_none_or(|t| t.is_empty()),
            None => true,
        };

        let organization_ok = match filter.organization_id {
            Some(root) => {
                let by_planter = tree
                    .planter_id()
                    .and_then(|p| self.planter_organizations.get(&p).copied())
                    .is_some_and(|org| self.within_organization(org, root));
                let by_planting_org = tree
                    .planting_organization_id()
                    .is_some_and(|org| self.within_organization(org, root));
                by_planter || by_planting_org
            }
            None => true,
        };

        tag_ok
            && organization_ok
            && filter.active.is_none_or(|a| tree.active() == a)
            && filter.approved.is_none_or(|a| tree.approved() == Some(a))
            && filter.planter_id.is_none_or(|p| tree.planter_id() == Some(p))
            && filter.species_id.is_none_or(|s| tree.species_id() == Some(s))
    }
}

#[derive(Default)]
struct Faults {
    load: AtomicBool,
    tree_write: AtomicBool,
    event_write: AtomicBool,
    commit: AtomicBool,
    status_update: AtomicBool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    faults: Faults,
    next_tx: AtomicU64,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    status_updates: AtomicUsize,
}

/// 暂存的部分更新
struct StagedUpdate {
    id: TreeId,
    update: TreeUpdate,
    at: DateTime<Utc>,
}

/// 内存事务句柄：暂存本事务内的写入
pub struct InMemoryTx {
    id: u64,
    isolation: IsolationLevel,
    tree_updates: Vec<StagedUpdate>,
    events: Table<DomainEventRecord>,
}

impl InMemoryTx {
    /// 在 `base` 上按顺序叠加本事务对该记录的暂存更新
    fn overlay(&self, mut base: TreeRecord) -> TreeRecord {
        let id = *base.id();
        for staged in self.tree_updates.iter().filter(|s| s.id == id) {
            base.apply(&staged.update, staged.at);
        }
        base
    }
}

/// 内存存储
#[derive(Clone, Default)]
pub struct InMemoryTreeStore {
    inner: Arc<Inner>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.inner
            .state
            .lock()
            .map_err(|e| DomainError::repository(format!("in-memory state poisoned: {e}")))
    }

    // --- 数据准备 ---

    /// 直接写入一条已提交的树木记录
    pub fn insert_tree(&self, tree: TreeRecord) -> Result<()> {
        self.state()?.trees.upsert(tree);
        Ok(())
    }

    pub fn tag_tree(&self, tree_id: TreeId, tag_id: i64) -> Result<()> {
        self.state()?
            .tree_tags
            .entry(tree_id)
            .or_default()
            .insert(tag_id);
        Ok(())
    }

    pub fn assign_planter(&self, planter_id: i64, organization_id: i64) -> Result<()> {
        self.state()?
            .planter_organizations
            .insert(planter_id, organization_id);
        Ok(())
    }

    /// 声明 `child` 为 `parent` 的下级组织
    pub fn nest_organization(&self, child: i64, parent: i64) -> Result<()> {
        self.state()?.organization_parents.insert(child, parent);
        Ok(())
    }

    // --- 已提交状态读取 ---

    pub fn tree(&self, id: TreeId) -> Result<Option<TreeRecord>> {
        Ok(self.state()?.trees.get(&id).cloned())
    }

    /// 已提交的事件日志（按创建时间排序）
    pub fn events(&self) -> Result<Vec<DomainEventRecord>> {
        let mut events: Vec<_> = self.state()?.events.values().cloned().collect();
        events.sort_by_key(|e| e.created_at());
        Ok(events)
    }

    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    pub fn status_update_count(&self) -> usize {
        self.inner.status_updates.load(Ordering::SeqCst)
    }

    // --- 故障注入 ---

    pub fn fail_loads(&self, fail: bool) {
        self.inner.faults.load.store(fail, Ordering::SeqCst);
    }

    pub fn fail_tree_writes(&self, fail: bool) {
        self.inner.faults.tree_write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_event_writes(&self, fail: bool) {
        self.inner.faults.event_write.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, fail: bool) {
        self.inner.faults.commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_status_updates(&self, fail: bool) {
        self.inner.faults.status_update.store(fail, Ordering::SeqCst);
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(DomainError::Database {
                reason: format!("injected {what} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for InMemoryTreeStore {
    type Tx = InMemoryTx;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx> {
        let id = self.inner.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(tx = id, %isolation, "begin in-memory transaction");

        Ok(InMemoryTx {
            id,
            isolation,
            tree_updates: Vec::new(),
            events: Table::default(),
        })
    }

    async fn commit(&self, mut tx: Self::Tx) -> Result<()> {
        if self.inner.faults.commit.load(Ordering::SeqCst) {
            self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
            return Err(DomainError::transaction(format!(
                "injected commit failure for tx {}",
                tx.id
            )));
        }

        let mut state = self.state()?;
        for staged in &tx.tree_updates {
            state.trees.require(&staged.id)?;
        }
        // 重放到当前已提交行，保留其他事务期间提交的列
        for staged in &tx.tree_updates {
            state
                .trees
                .require_mut(&staged.id)?
                .apply(&staged.update, staged.at);
        }
        for event in tx.events.drain() {
            state.events.upsert(event);
        }
        drop(state);

        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        debug!(
            tx = tx.id,
            isolation = %tx.isolation,
            tree_updates = tx.tree_updates.len(),
            "commit in-memory transaction"
        );
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<()> {
        self.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!(tx = tx.id, "rollback in-memory transaction");
        Ok(())
    }
}

#[async_trait]
impl TreeRepository<InMemoryTx> for InMemoryTreeStore {
    async fn find_by_id(&self, tx: &mut InMemoryTx, id: TreeId) -> Result<Option<TreeRecord>> {
        Self::injected(&self.inner.faults.load, "load")?;

        let committed = self.state()?.trees.get(&id).cloned();
        Ok(committed.map(|tree| tx.overlay(tree)))
    }

    async fn apply_update(
        &self,
        tx: &mut InMemoryTx,
        id: TreeId,
        update: &TreeUpdate,
        at: DateTime<Utc>,
    ) -> Result<()> {
        Self::injected(&self.inner.faults.tree_write, "tree write")?;

        self.state()?.trees.require(&id)?;
        tx.tree_updates.push(StagedUpdate {
            id,
            update: update.clone(),
            at,
        });
        Ok(())
    }
}

#[async_trait]
impl DomainEventRepository<InMemoryTx> for InMemoryTreeStore {
    async fn create(&self, tx: &mut InMemoryTx, event: &DomainEventRecord) -> Result<()> {
        Self::injected(&self.inner.faults.event_write, "event write")?;

        if tx.events.contains(event.id()) || self.state()?.events.contains(event.id()) {
            return Err(DomainError::event_repository(format!(
                "duplicate domain event {}",
                event.id()
            )));
        }
        tx.events.upsert(event.clone());
        Ok(())
    }

    async fn update_status(&self, id: Uuid, status: EventStatus, at: DateTime<Utc>) -> Result<()> {
        Self::injected(&self.inner.faults.status_update, "status update")?;

        let mut state = self.state()?;
        state.events.require_mut(&id)?.set_status(status, at);
        drop(state);

        self.inner.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<DomainEventRecord>> {
        Ok(self.state()?.events.get(&id).cloned())
    }
}

#[async_trait]
impl TreeQueryRepository for InMemoryTreeStore {
    async fn find(&self, filter: &TreeFilter) -> Result<Vec<TreeRecord>> {
        Self::injected(&self.inner.faults.load, "load")?;

        let state = self.state()?;
        let mut trees: Vec<TreeRecord> = state
            .trees
            .values()
            .filter(|t| state.matches(t, filter))
            .cloned()
            .collect();
        drop(state);

        trees.sort_by(|a, b| {
            let ord = match filter.order_by {
                TreeSortField::Id => a.id().cmp(b.id()),
                TreeSortField::TimeCreated => a.time_created().cmp(&b.time_created()),
                TreeSortField::TimeUpdated => a.time_updated().cmp(&b.time_updated()),
            };
            match filter.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);
        Ok(trees.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &TreeFilter) -> Result<u64> {
        Self::injected(&self.inner.faults.load, "load")?;

        let state = self.state()?;
        let count = state
            .trees
            .values()
            .filter(|t| state.matches(t, filter))
            .count();
        Ok(count as u64)
    }

    async fn get(&self, id: TreeId) -> Result<Option<TreeRecord>> {
        Self::injected(&self.inner.faults.load, "load")?;
        self.tree(id)
    }
}
