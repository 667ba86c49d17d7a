//! 区域管理器
//!
//! 每个场景一个管理器，独占区域集合和撤销历史：
//! - 批量创建、更新、删除，每批一条历史记录
//! - 撤销（有界历史）
//! - 点击查询、框选查询
//! - 选择集与剪贴板
//! - 持久化（同一批写入并发发出，失败不回滚内存状态）
//!
//! 交互编辑和多点绘制的实现见 [`crate::edit`]。

use crate::config::ManagerConfig;
use crate::edit::ActiveEdit;
use crate::error::{Result, StoreError, ZoneError};
use crate::events::{EventBus, NoticeLevel, ZoneEvent};
use crate::geometry;
use crate::history::{History, HistoryEntry};
use crate::kind::{AmbientFilter, AmbientState, FEATHER_ATTRIBUTE};
use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use crate::persistence::ZoneStore;
use crate::schema::{ZonePatch, FIELDS, GEOMETRY_FIELDS};
use crate::spatial::SpatialIndex;
use crate::zone::{SceneId, ZoneId, ZoneRecord};
use futures::channel::mpsc;
use futures::future::join_all;
use tracing::{debug, info, warn};

/// 创建选项
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// 保留输入记录自带的ID（撤销删除时使用）
    pub force_id: bool,
    /// 创建后把选择集替换为新区域
    pub control: bool,
    pub store_history: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            force_id: false,
            control: false,
            store_history: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateOptions {
    pub store_history: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self { store_history: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteOptions {
    pub store_history: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self { store_history: true }
    }
}

/// 撤销结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone { operation: &'static str, zones: usize },
    /// 历史为空（提示，不是错误）
    Exhausted,
}

/// 区域管理器
pub struct ZoneManager<S: ZoneStore> {
    pub(crate) scene: SceneId,
    pub(crate) store: S,
    pub(crate) config: ManagerConfig,

    /// 按插入序号排序
    pub(crate) zones: Vec<ZoneRecord>,
    pub(crate) next_seq: u64,
    pub(crate) spatial: SpatialIndex,
    pub(crate) history: History,

    pub(crate) selection: Vec<ZoneId>,
    pub(crate) clipboard: Vec<ZoneRecord>,

    /// 进行中的拖拽
    pub(crate) edit: Option<ActiveEdit>,
    /// 绘制中的新区域（易失）
    pub(crate) draft: Option<ZoneRecord>,

    pub(crate) events: EventBus,
}

impl<S: ZoneStore> ZoneManager<S> {
    pub fn new(scene: SceneId, store: S, config: ManagerConfig) -> Self {
        Self {
            scene,
            store,
            spatial: SpatialIndex::new(config.spatial_cell_size),
            history: History::new(config.history_depth),
            config,
            zones: Vec::new(),
            next_seq: 1,
            selection: Vec::new(),
            clipboard: Vec::new(),
            edit: None,
            draft: None,
            events: EventBus::new(),
        }
    }

    pub fn with_defaults(scene: SceneId, store: S) -> Self {
        Self::new(scene, store, ManagerConfig::default())
    }

    // === 访问器 ===

    pub fn scene(&self) -> &SceneId {
        &self.scene
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// 所有区域（按插入序号）
    pub fn zones(&self) -> &[ZoneRecord] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, id: ZoneId) -> Option<&ZoneRecord> {
        self.zones.iter().find(|z| z.id() == id)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn subscribe(
        &mut self,
        subscriber_id: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<ZoneEvent> {
        self.events.subscribe(subscriber_id)
    }

    pub(crate) fn position(&self, id: ZoneId) -> Option<usize> {
        self.zones.iter().position(|z| z.id() == id)
    }

    pub(crate) fn zone_mut(&mut self, id: ZoneId) -> Option<&mut ZoneRecord> {
        self.zones.iter_mut().find(|z| z.id() == id)
    }

    /// 替换集合中的记录并更新索引
    pub(crate) fn replace_zone(&mut self, record: ZoneRecord) {
        if let Some(index) = self.position(record.id()) {
            self.spatial.insert(record.id(), record.frame().bbox());
            self.zones[index] = record;
        }
    }

    fn insert_zone(&mut self, record: ZoneRecord) {
        let index = self.zones.partition_point(|z| z.seq() <= record.seq());
        self.spatial.insert(record.id(), record.frame().bbox());
        self.zones.insert(index, record);
    }

    pub(crate) fn push_history(&mut self, entry: HistoryEntry) {
        if let Some(evicted) = self.history.push(entry) {
            debug!("History full, dropped oldest {} entry", evicted.name());
        }
    }

    // === 批量操作 ===

    /// 创建区域
    ///
    /// 所有输入先校验，任一无效则整批拒绝。
    /// 只返回新区域的ID（与输入同序），记录本身用 `get` 或 `zones` 读取。
    pub async fn create(
        &mut self,
        records: Vec<ZoneRecord>,
        options: CreateOptions,
    ) -> Result<Vec<ZoneId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut next_seq = self.next_seq;
        let mut staged: Vec<ZoneRecord> = Vec::with_capacity(records.len());
        for mut record in records {
            record.set_drafting(false);
            record.normalize(false);
            record.validate(self.config.min_distance)?;

            let keep_id = options.force_id && !record.is_volatile();
            if keep_id {
                let id = record.id();
                if self.get(id).is_some() || staged.iter().any(|r| r.id() == id) {
                    return Err(ZoneError::DuplicateId(id));
                }
                record.assign_id(id);
            } else {
                record.assign_id(ZoneId::random());
            }

            if keep_id && record.seq() != 0 {
                next_seq = next_seq.max(record.seq() + 1);
            } else {
                record.set_seq(next_seq);
                next_seq += 1;
            }
            record.set_flush_pending(true);
            staged.push(record);
        }

        let ids: Vec<ZoneId> = staged.iter().map(|r| r.id()).collect();
        self.next_seq = next_seq;
        for record in staged {
            self.insert_zone(record);
        }
        if options.control {
            self.selection = ids.clone();
        }
        if options.store_history {
            self.push_history(HistoryEntry::Created { ids: ids.clone() });
        }

        info!("Created {} zones in scene {}", ids.len(), self.scene);
        self.events.publish(ZoneEvent::Created { ids: ids.clone() });

        self.persist(&ids).await?;
        Ok(ids)
    }

    /// 批量更新字段
    ///
    /// 整批先在副本上执行；任何字段类型或几何错误都会拒绝整批，内存不变。
    pub async fn update(
        &mut self,
        patches: Vec<ZonePatch>,
        options: UpdateOptions,
    ) -> Result<Vec<ZoneId>> {
        self.write_patches(patches, options.store_history, true).await
    }

    async fn write_patches(
        &mut self,
        patches: Vec<ZonePatch>,
        store_history: bool,
        enforce_lock: bool,
    ) -> Result<Vec<ZoneId>> {
        let (ids, inverse) = self.apply_patches(patches, enforce_lock)?;
        if ids.is_empty() {
            return Ok(ids);
        }
        if store_history {
            self.push_history(HistoryEntry::Updated { inverse });
        }

        debug!("Updated {} zones in scene {}", ids.len(), self.scene);
        self.events.publish(ZoneEvent::Updated { ids: ids.clone() });

        self.persist(&ids).await?;
        Ok(ids)
    }

    /// 应用补丁，返回受影响的ID和逆补丁
    fn apply_patches(
        &mut self,
        patches: Vec<ZonePatch>,
        enforce_lock: bool,
    ) -> Result<(Vec<ZoneId>, Vec<ZonePatch>)> {
        let mut staged: Vec<ZoneRecord> = Vec::new();
        let mut inverse: Vec<ZonePatch> = Vec::new();
        let mut geometry_touched: Vec<bool> = Vec::new();

        for patch in patches.into_iter().filter(|p| !p.is_empty()) {
            let original = self.get(patch.id).ok_or(ZoneError::ZoneNotFound(patch.id))?;
            if enforce_lock
                && original.locked()
                && patch.fields.keys().any(|k| k != "locked" && k != "enabled")
            {
                return Err(ZoneError::Locked(patch.id));
            }

            let slot = match staged.iter().position(|r| r.id() == patch.id) {
                Some(slot) => slot,
                None => {
                    staged.push(original.clone());
                    inverse.push(ZonePatch::new(patch.id));
                    geometry_touched.push(false);
                    staged.len() - 1
                }
            };

            // 逆补丁记录整批开始前的值，每个字段只记一次
            let undo = &mut inverse[slot];
            for key in patch.fields.keys() {
                let captured: Vec<&str> = if GEOMETRY_FIELDS.contains(&key.as_str()) {
                    GEOMETRY_FIELDS.to_vec()
                } else {
                    vec![key.as_str()]
                };
                for field in captured {
                    if !undo.fields.contains_key(field) {
                        undo.fields.insert(field.to_string(), original.get_field(field)?);
                    }
                }
            }

            let working = &mut staged[slot];
            for spec in FIELDS {
                if let Some(value) = patch.fields.get(spec.name) {
                    working.set_field(spec.name, value.clone())?;
                }
            }
            geometry_touched[slot] |= patch.touches_geometry();
        }

        for (record, touched) in staged.iter_mut().zip(&geometry_touched) {
            record.normalize(false);
            if *touched {
                record.validate(self.config.min_distance)?;
            }
            record.set_flush_pending(true);
        }

        let ids = staged.iter().map(|r| r.id()).collect();
        for record in staged {
            self.replace_zone(record);
        }
        Ok((ids, inverse))
    }

    /// 删除区域
    pub async fn delete(&mut self, ids: &[ZoneId], options: DeleteOptions) -> Result<Vec<ZoneId>> {
        let mut targets: Vec<ZoneId> = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.get(id).is_none() {
                return Err(ZoneError::ZoneNotFound(id));
            }
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        if targets.is_empty() {
            return Ok(targets);
        }

        let mut snapshots = Vec::with_capacity(targets.len());
        for &id in &targets {
            if let Some(index) = self.position(id) {
                snapshots.push(self.zones.remove(index));
            }
            self.spatial.remove(&id);
        }
        self.selection.retain(|id| !targets.contains(id));
        if self.edit.as_ref().is_some_and(|e| targets.contains(&e.zone)) {
            debug!("Dropping active edit on deleted zone");
            self.edit = None;
        }

        if options.store_history {
            self.push_history(HistoryEntry::Deleted { snapshots });
        }

        info!("Deleted {} zones from scene {}", targets.len(), self.scene);
        self.events.publish(ZoneEvent::Deleted { ids: targets.clone() });

        let removals: Vec<ZoneId> = targets
            .iter()
            .copied()
            .filter(|id| !id.is_volatile())
            .collect();
        let results = {
            let writes = removals.iter().map(|&id| self.store.delete_one(&self.scene, id));
            join_all(writes).await
        };
        self.settle(removals.into_iter().zip(results).collect())?;
        Ok(targets)
    }

    /// 撤销最近一次操作
    pub async fn undo(&mut self) -> Result<UndoOutcome> {
        if self.edit.is_some() {
            return Err(ZoneError::EditInProgress);
        }
        let Some(entry) = self.history.pop() else {
            info!("Nothing to undo in scene {}", self.scene);
            return Ok(UndoOutcome::Exhausted);
        };

        let operation = entry.name();
        let zones = entry.len();
        match entry {
            HistoryEntry::Created { ids } => {
                self.delete(&ids, DeleteOptions { store_history: false }).await?;
            }
            HistoryEntry::Deleted { snapshots } => {
                let options = CreateOptions {
                    force_id: true,
                    control: false,
                    store_history: false,
                };
                self.create(snapshots, options).await?;
            }
            HistoryEntry::Updated { inverse } => {
                self.write_patches(inverse, false, false).await?;
            }
        }

        info!("Undid {} of {} zones", operation, zones);
        Ok(UndoOutcome::Undone { operation, zones })
    }

    // === 顶点编辑 ===

    /// 在已存储区域上插入顶点（场景坐标）
    pub async fn insert_vertex(
        &mut self,
        id: ZoneId,
        after_index: usize,
        at: Point2,
    ) -> Result<()> {
        let record = self.get(id).ok_or(ZoneError::ZoneNotFound(id))?;
        if record.locked() {
            return Err(ZoneError::Locked(id));
        }
        let mut candidate = record.clone();
        candidate.insert_vertex(after_index, record.to_local(at), self.config.min_distance)?;

        let patch = ZonePatch::new(id).set("vertices", candidate.vertices().to_vec());
        self.update(vec![patch], UpdateOptions::default()).await?;
        Ok(())
    }

    /// 删除顶点；被拒绝时通过事件提示用户
    pub async fn remove_vertex(&mut self, id: ZoneId, index: usize) -> Result<()> {
        let record = self.get(id).ok_or(ZoneError::ZoneNotFound(id))?;
        if record.locked() {
            return Err(ZoneError::Locked(id));
        }
        let mut candidate = record.clone();
        if let Err(e) = candidate.remove_vertex(index, self.config.min_distance) {
            if let ZoneError::RemovalRejected(reason) = &e {
                warn!("Rejected vertex removal on {}: {}", id, reason);
                self.events
                    .notice(NoticeLevel::Warning, format!("Cannot remove vertex: {}", reason));
            }
            return Err(e);
        }

        let patch = ZonePatch::new(id).set("vertices", candidate.vertices().to_vec());
        self.update(vec![patch], UpdateOptions::default()).await?;
        Ok(())
    }

    // === 查询 ===

    /// 包含该点的区域，最上层在前（z_order 降序，同层后建的在前）
    ///
    /// 禁用的区域也会返回。
    pub fn point_query(&self, x: f64, y: f64) -> Vec<ZoneId> {
        let point = Point2::new(x, y);
        let mut hits: Vec<&ZoneRecord> = self
            .spatial
            .query_point(&point)
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|z| z.contains(point))
            .collect();
        hits.sort_by(|a, b| b.z_order().cmp(&a.z_order()).then(b.seq().cmp(&a.seq())));
        hits.into_iter().map(|z| z.id()).collect()
    }

    /// 外框与矩形相交的区域（按插入序号）
    pub fn selection_query(&self, rect: &BoundingBox2) -> Vec<ZoneId> {
        let mut hits: Vec<&ZoneRecord> = self
            .spatial
            .query_rect(rect)
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect();
        hits.sort_by_key(|z| z.seq());
        hits.into_iter().map(|z| z.id()).collect()
    }

    /// 计算某点的局部环境状态
    ///
    /// 取最上层的启用区域过滤；靠近可穿透边时在羽化带内与外部环境混合。
    pub fn ambient_at(
        &self,
        x: f64,
        y: f64,
        ambient: &AmbientState,
        filter: &impl AmbientFilter,
    ) -> AmbientState {
        let point = Point2::new(x, y);
        let Some(zone) = self
            .point_query(x, y)
            .into_iter()
            .filter_map(|id| self.get(id))
            .find(|z| z.enabled())
        else {
            return *ambient;
        };

        let filtered = filter.filter(zone.kind(), zone.kind_attributes(), ambient);
        let feather = zone
            .kind_attributes()
            .get(FEATHER_ATTRIBUTE)
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        let frame = zone.frame();
        let band = feather / 100.0 * frame.width.min(frame.height) / 2.0;

        let weight = if band < EPSILON {
            1.0
        } else {
            geometry::distance_to_edges(zone.vertices(), zone.to_local(point), |v| v.permeable)
                .map_or(1.0, |d| (d / band).min(1.0))
        };
        ambient.blend(&filtered, weight)
    }

    // === 选择集与剪贴板 ===

    /// 替换选择集（忽略不存在的ID）
    pub fn select(&mut self, ids: &[ZoneId]) {
        self.selection = ids.iter().copied().filter(|&id| self.get(id).is_some()).collect();
    }

    pub fn selected(&self) -> &[ZoneId] {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub async fn delete_selected(&mut self) -> Result<Vec<ZoneId>> {
        let ids = self.selection.clone();
        self.delete(&ids, DeleteOptions::default()).await
    }

    /// 复制选中区域，返回复制数量
    pub fn copy_selected(&mut self) -> usize {
        self.clipboard = self
            .selection
            .iter()
            .filter_map(|&id| self.get(id))
            .map(|z| z.clone_volatile())
            .collect();
        self.clipboard.len()
    }

    /// 粘贴剪贴板内容，新区域成为选择集
    ///
    /// 每次粘贴后剪贴板再偏移一次，连续粘贴依次错开。
    pub async fn paste(&mut self, offset: Option<Vector2>) -> Result<Vec<ZoneId>> {
        if self.clipboard.is_empty() {
            return Ok(Vec::new());
        }
        let (dx, dy) = self.config.paste_offset;
        let offset = offset.unwrap_or_else(|| Vector2::new(dx, dy));
        for record in &mut self.clipboard {
            record.translate(offset.x, offset.y);
        }

        let records = self.clipboard.clone();
        let options = CreateOptions {
            control: true,
            ..CreateOptions::default()
        };
        self.create(records, options).await
    }

    // === 存储 ===

    /// 从存储重新加载场景；清空历史、选择集和进行中的编辑
    pub async fn load(&mut self) -> Result<usize> {
        let mut records = self.store.load_all(&self.scene).await?;

        let max_seq = records.iter().map(|r| r.seq()).max().unwrap_or(0);
        let mut next_seq = max_seq + 1;
        for record in records.iter_mut().filter(|r| r.seq() == 0) {
            record.set_seq(next_seq);
            record.set_flush_pending(true);
            next_seq += 1;
        }
        records.sort_by_key(|r| r.seq());

        self.spatial.clear();
        for record in &records {
            self.spatial.insert(record.id(), record.frame().bbox());
        }
        self.zones = records;
        self.next_seq = next_seq;
        self.history.clear();
        self.selection.clear();
        self.clipboard.clear();
        self.edit = None;
        self.draft = None;

        info!("Loaded {} zones for scene {}", self.zones.len(), self.scene);
        Ok(self.zones.len())
    }

    /// 写出所有未同步的区域，返回写出数量
    pub async fn flush(&mut self) -> Result<usize> {
        let ids: Vec<ZoneId> = self
            .zones
            .iter()
            .filter(|z| z.flush_pending() || z.is_dirty())
            .map(|z| z.id())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        self.persist(&ids).await?;
        info!("Flushed {} zones in scene {}", ids.len(), self.scene);
        Ok(ids.len())
    }

    /// 删除场景内所有区域
    pub async fn clear(&mut self, store_history: bool) -> Result<usize> {
        let snapshots = std::mem::take(&mut self.zones);
        let ids: Vec<ZoneId> = snapshots.iter().map(|z| z.id()).collect();
        self.spatial.clear();
        self.selection.clear();
        self.edit = None;
        if store_history {
            self.push_history(HistoryEntry::Deleted { snapshots });
        }

        info!("Cleared {} zones from scene {}", ids.len(), self.scene);
        self.events.publish(ZoneEvent::Deleted { ids: ids.clone() });

        if let Err(e) = self.store.delete_all(&self.scene).await {
            return Err(self.report_failure(ids, e));
        }
        Ok(ids.len())
    }

    /// 并发写出一批区域
    pub(crate) async fn persist(&mut self, ids: &[ZoneId]) -> Result<()> {
        let (saved, results) = {
            let targets: Vec<&ZoneRecord> = ids.iter().filter_map(|&id| self.get(id)).collect();
            let saved: Vec<ZoneId> = targets.iter().map(|r| r.id()).collect();
            let writes = targets.into_iter().map(|r| self.store.save_one(&self.scene, r));
            (saved, join_all(writes).await)
        };
        self.settle(saved.into_iter().zip(results).collect())
    }

    /// 处理一批写入的结果：成功的标记为已持久化，失败的保持 dirty
    fn settle(
        &mut self,
        outcomes: Vec<(ZoneId, std::result::Result<(), StoreError>)>,
    ) -> Result<()> {
        let total = outcomes.len();
        let mut failed = Vec::new();
        let mut first = None;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    if let Some(zone) = self.zone_mut(id) {
                        zone.mark_persisted();
                    }
                }
                Err(e) => {
                    failed.push(id);
                    if first.is_none() {
                        first = Some(e);
                    }
                }
            }
        }

        let Some(first) = first else {
            return Ok(());
        };
        let error = if total == 1 {
            first
        } else {
            StoreError::Partial {
                failed: failed.len(),
                total,
                first: Box::new(first),
            }
        };
        Err(self.report_failure(failed, error))
    }

    fn report_failure(&mut self, ids: Vec<ZoneId>, error: StoreError) -> ZoneError {
        warn!("Persistence failed for {} zones in scene {}: {}", ids.len(), self.scene, error);
        self.events.publish(ZoneEvent::PersistenceFailed {
            ids,
            error: error.to_string(),
        });
        ZoneError::Persistence(error)
    }
}

/// 记录当前几何的补丁（用作编辑的逆操作）
pub(crate) fn geometry_patch(record: &ZoneRecord) -> Result<ZonePatch> {
    let mut patch = ZonePatch::new(record.id());
    for field in GEOMETRY_FIELDS {
        patch.fields.insert(field.to_string(), record.get_field(field)?);
    }
    Ok(patch)
}

/// 两条记录的几何是否一致
pub(crate) fn same_geometry(a: &ZoneRecord, b: &ZoneRecord) -> bool {
    a.frame() == b.frame() && a.vertices() == b.vertices()
}
