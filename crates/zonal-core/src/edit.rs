//! 交互编辑状态机
//!
//! 一次拖拽手势的生命周期：
//!
//! ```text
//! IDLE --begin_edit--> DRAFTING --commit_edit--> COMMITTED (持久化 + 一条历史记录)
//!                          |
//!                          +------cancel_edit--> CANCELLED (恢复手势开始前的快照)
//! ```
//!
//! DRAFTING 期间每次 `continue_edit` 都从手势开始时的基准状态重新计算
//! 几何并校验，无效的一帧直接忽略，保留上一帧的有效状态。这个阶段不写存储。

use crate::error::{Result, ZoneError};
use crate::events::ZoneEvent;
use crate::geometry::{Vertex, MAX_VERTICES, VERTEX_EPSILON};
use crate::history::HistoryEntry;
use crate::manager::{geometry_patch, same_geometry, CreateOptions, ZoneManager};
use crate::math::{Point2, Vector2, EPSILON};
use crate::persistence::ZoneStore;
use crate::schema::FieldValue;
use crate::zone::{Frame, ZoneId, ZoneRecord};
use tracing::{debug, info};

/// 修饰键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// 外框缩放保持宽高比；整体移动锁定单轴
    pub shift: bool,
    /// 拖拽边时先在起点插入顶点
    pub alt: bool,
    /// 目标点吸附到网格
    pub ctrl: bool,
}

/// 指针手势：起点为手势按下的位置，终点为当前指针位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditGesture {
    pub origin: Point2,
    pub destination: Point2,
    pub modifiers: Modifiers,
}

impl EditGesture {
    pub fn new(origin: Point2, destination: Point2) -> Self {
        Self {
            origin,
            destination,
            modifiers: Modifiers::default(),
        }
    }

    /// 按下（起点 = 终点）
    pub fn press(at: Point2) -> Self {
        Self::new(at, at)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn delta(&self) -> Vector2 {
        self.destination - self.origin
    }
}

/// 外框控制柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    /// 拖动整体
    Body,
}

impl FrameHandle {
    fn is_corner(&self) -> bool {
        matches!(
            self,
            FrameHandle::TopLeft
                | FrameHandle::TopRight
                | FrameHandle::BottomRight
                | FrameHandle::BottomLeft
        )
    }
}

/// 编辑目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Frame(FrameHandle),
    Vertex(usize),
    Edge(usize),
}

/// 编辑阶段（对外只读）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    Drafting { zone: ZoneId, target: EditTarget },
}

/// 手势结束结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// 有改动，已写入历史并持久化
    Committed(ZoneId),
    /// 没有任何有效改动
    Unchanged,
    Cancelled,
}

/// 进行中的编辑
#[derive(Debug, Clone)]
pub(crate) struct ActiveEdit {
    pub zone: ZoneId,
    pub target: EditTarget,
    /// 手势开始前的状态：取消时恢复，提交时作为逆操作
    pub snapshot: ZoneRecord,
    /// 每一帧的计算基准（alt 插入顶点后与快照不同）
    pub base: ZoneRecord,
    /// 是否已有一帧被接受
    pub touched: bool,
}

/// 把点吸附到网格
pub fn snap_to_grid(point: Point2, grid: f64) -> Point2 {
    if grid < EPSILON {
        return point;
    }
    Point2::new((point.x / grid).round() * grid, (point.y / grid).round() * grid)
}

/// 只保留绝对值较大的分量
pub fn constrain_axis(delta: Vector2) -> Vector2 {
    if delta.x.abs() >= delta.y.abs() {
        Vector2::new(delta.x, 0.0)
    } else {
        Vector2::new(0.0, delta.y)
    }
}

/// 根据控制柄和位移计算新外框
///
/// 结果可能宽高为负（拖过了对边），由调用方拒绝。
pub fn dragged_frame(
    frame: Frame,
    handle: FrameHandle,
    delta: Vector2,
    keep_aspect: bool,
) -> Frame {
    let (mut left, mut top) = (frame.x, frame.y);
    let (mut right, mut bottom) = (frame.x + frame.width, frame.y + frame.height);

    match handle {
        FrameHandle::Body => {
            return Frame::new(frame.x + delta.x, frame.y + delta.y, frame.width, frame.height);
        }
        FrameHandle::TopLeft => {
            left += delta.x;
            top += delta.y;
        }
        FrameHandle::Top => top += delta.y,
        FrameHandle::TopRight => {
            right += delta.x;
            top += delta.y;
        }
        FrameHandle::Right => right += delta.x,
        FrameHandle::BottomRight => {
            right += delta.x;
            bottom += delta.y;
        }
        FrameHandle::Bottom => bottom += delta.y,
        FrameHandle::BottomLeft => {
            left += delta.x;
            bottom += delta.y;
        }
        FrameHandle::Left => left += delta.x,
    }

    let mut width = right - left;
    let mut height = bottom - top;

    if keep_aspect && handle.is_corner() && frame.width > EPSILON && frame.height > EPSILON {
        let sx = width / frame.width;
        let sy = height / frame.height;
        let s = if sx.abs() >= sy.abs() { sx } else { sy };
        width = frame.width * s;
        height = frame.height * s;
        // 以对角为锚点
        if matches!(handle, FrameHandle::TopLeft | FrameHandle::BottomLeft) {
            left = right - width;
        }
        if matches!(handle, FrameHandle::TopLeft | FrameHandle::TopRight) {
            top = bottom - height;
        }
    }

    Frame::new(left, top, width, height)
}

/// 在基准记录上应用一帧位移，返回新状态；无效时返回错误
pub(crate) fn apply_drag(
    base: &ZoneRecord,
    target: EditTarget,
    gesture: &EditGesture,
    grid_size: f64,
    min_distance: f64,
) -> Result<ZoneRecord, ZoneError> {
    let destination = if gesture.modifiers.ctrl {
        snap_to_grid(gesture.destination, grid_size)
    } else {
        gesture.destination
    };
    let delta = destination - gesture.origin;

    let mut next = base.clone();
    match target {
        EditTarget::Frame(FrameHandle::Body) => {
            let delta = if gesture.modifiers.shift {
                constrain_axis(delta)
            } else {
                delta
            };
            next.translate(delta.x, delta.y);
        }
        EditTarget::Frame(handle) => {
            let frame = dragged_frame(base.frame(), handle, delta, gesture.modifiers.shift);
            next.resize(frame, min_distance)?;
        }
        EditTarget::Vertex(index) => {
            let len = base.vertices().len();
            let start = base
                .vertices()
                .get(index)
                .ok_or(ZoneError::VertexIndex { index, len })?;
            let position = if gesture.modifiers.ctrl {
                // 吸附作用于顶点最终的场景位置
                let moved = gesture.destination - gesture.origin;
                let scene = snap_to_grid(
                    base.frame().origin() + (start.point() - Point2::origin()) + moved,
                    grid_size,
                );
                base.to_local(scene)
            } else {
                start.point() + delta
            };
            next.move_vertex(index, position, min_distance)?;
        }
        EditTarget::Edge(index) => {
            next.move_edge(index, delta, min_distance)?;
        }
    }
    next.normalize(false);
    Ok(next)
}

impl<S: ZoneStore> ZoneManager<S> {
    pub fn edit_phase(&self) -> EditPhase {
        match &self.edit {
            Some(edit) => EditPhase::Drafting {
                zone: edit.zone,
                target: edit.target,
            },
            None => EditPhase::Idle,
        }
    }

    /// 开始拖拽
    ///
    /// 按住 alt 拖边时，先在手势起点处插入顶点，然后拖动这个新顶点。
    pub fn begin_edit(
        &mut self,
        id: ZoneId,
        target: EditTarget,
        gesture: &EditGesture,
    ) -> Result<()> {
        if self.edit.is_some() || self.draft.is_some() {
            return Err(ZoneError::EditInProgress);
        }
        let record = self.get(id).ok_or(ZoneError::ZoneNotFound(id))?;
        if record.locked() {
            return Err(ZoneError::Locked(id));
        }

        let snapshot = record.clone();
        let mut base = snapshot.clone();
        let mut target = target;
        if let (EditTarget::Edge(index), true) = (target, gesture.modifiers.alt) {
            let len = base.vertices().len();
            base.insert_vertex(index, base.to_local(gesture.origin), self.config.min_distance)?;
            // 插入点与端点重合时被合并，仍按拖边处理
            if base.vertices().len() > len {
                target = EditTarget::Vertex(index + 1);
            }
        }

        debug!("Begin edit of {} ({:?})", id, target);
        self.edit = Some(ActiveEdit {
            zone: id,
            target,
            snapshot,
            base,
            touched: false,
        });
        Ok(())
    }

    /// 指针移动：返回这一帧是否被接受
    ///
    /// 无效的一帧不报错，区域保持上一帧的有效状态。
    pub fn continue_edit(&mut self, gesture: &EditGesture) -> Result<bool> {
        let edit = self.edit.as_ref().ok_or(ZoneError::NoActiveEdit)?;
        let id = edit.zone;
        match apply_drag(
            &edit.base,
            edit.target,
            gesture,
            self.config.grid_size,
            self.config.min_distance,
        ) {
            Ok(next) => {
                self.replace_zone(next);
                if let Some(edit) = self.edit.as_mut() {
                    edit.touched = true;
                }
                self.events.publish(ZoneEvent::Updated { ids: vec![id] });
                Ok(true)
            }
            Err(e) => {
                debug!("Ignoring drag frame on {}: {}", id, e);
                Ok(false)
            }
        }
    }

    /// 结束拖拽：写入一条历史记录并持久化
    pub async fn commit_edit(&mut self) -> Result<EditOutcome> {
        let edit = self.edit.take().ok_or(ZoneError::NoActiveEdit)?;
        if !edit.touched {
            return Ok(EditOutcome::Unchanged);
        }

        let Some(zone) = self.zone_mut(edit.zone) else {
            return Ok(EditOutcome::Unchanged);
        };
        zone.normalize(true);
        if same_geometry(zone, &edit.snapshot) {
            self.replace_zone(edit.snapshot);
            return Ok(EditOutcome::Unchanged);
        }

        self.push_history(HistoryEntry::Updated {
            inverse: vec![geometry_patch(&edit.snapshot)?],
        });
        info!("Committed edit of {}", edit.zone);
        self.events.publish(ZoneEvent::Updated { ids: vec![edit.zone] });

        self.persist(&[edit.zone]).await?;
        Ok(EditOutcome::Committed(edit.zone))
    }

    /// 取消拖拽，恢复手势开始前的状态
    pub fn cancel_edit(&mut self) -> Result<EditOutcome> {
        let edit = self.edit.take().ok_or(ZoneError::NoActiveEdit)?;
        let id = edit.zone;
        self.replace_zone(edit.snapshot);
        if edit.touched {
            self.events.publish(ZoneEvent::Updated { ids: vec![id] });
        }
        debug!("Cancelled edit of {}", id);
        Ok(EditOutcome::Cancelled)
    }

    // === 多点绘制 ===

    /// 绘制中的区域（预览用）
    pub fn draft(&self) -> Option<&ZoneRecord> {
        self.draft.as_ref()
    }

    /// 在场景坐标处放下第一个点
    pub fn begin_draft(&mut self, at: Point2) -> Result<()> {
        if self.edit.is_some() || self.draft.is_some() {
            return Err(ZoneError::EditInProgress);
        }
        let mut draft = ZoneRecord::new(vec![Vertex::new(at.x, at.y)]);
        draft.set_drafting(true);
        self.draft = Some(draft);
        Ok(())
    }

    /// 追加一个点；返回多边形是否已闭合（回到起点）
    pub fn extend_draft(&mut self, at: Point2) -> Result<bool> {
        let draft = self.draft.as_mut().ok_or(ZoneError::NoActiveEdit)?;
        if draft.vertices().len() > MAX_VERTICES {
            return Err(ZoneError::GeometryInvalid(format!(
                "a zone has at most {} vertices",
                MAX_VERTICES
            )));
        }

        let local = draft.to_local(at);
        let mut vertices = draft.vertices().to_vec();
        vertices.push(Vertex::new(local.x, local.y));
        draft.set_field("vertices", FieldValue::Vertices(vertices))?;
        draft.normalize(false);

        let closed = match (draft.scene_vertex(0), draft.vertices().len()) {
            (Some(first), n) if n > 3 => (first - at).norm() <= VERTEX_EPSILON,
            _ => false,
        };
        Ok(closed)
    }

    /// 提交绘制，新区域成为选择集
    ///
    /// 形状无效时绘制保持原样，可以继续追加点或取消。
    pub async fn commit_draft(&mut self) -> Result<ZoneId> {
        let draft = self.draft.take().ok_or(ZoneError::NoActiveEdit)?;
        let mut record = draft.clone();
        record.set_drafting(false);
        record.normalize(false);
        if let Err(e) = record.validate(self.config.min_distance) {
            self.draft = Some(draft);
            return Err(e);
        }

        let options = CreateOptions {
            control: true,
            ..CreateOptions::default()
        };
        let ids = self.create(vec![record], options).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| ZoneError::GeometryInvalid("draft produced no zone".to_string()))
    }

    pub fn cancel_draft(&mut self) -> bool {
        self.draft.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::zone::SceneId;

    #[test]
    fn test_dragged_frame_handles() {
        let frame = Frame::new(0.0, 0.0, 100.0, 50.0);
        let d = Vector2::new(10.0, 20.0);

        let drag = |handle| dragged_frame(frame, handle, d, false);

        assert_eq!(drag(FrameHandle::Body), Frame::new(10.0, 20.0, 100.0, 50.0));
        assert_eq!(drag(FrameHandle::BottomRight), Frame::new(0.0, 0.0, 110.0, 70.0));
        assert_eq!(drag(FrameHandle::TopLeft), Frame::new(10.0, 20.0, 90.0, 30.0));
        assert_eq!(drag(FrameHandle::Left), Frame::new(10.0, 0.0, 90.0, 50.0));
    }

    #[test]
    fn test_dragged_frame_keeps_aspect() {
        let frame = Frame::new(0.0, 0.0, 100.0, 50.0);
        let f = dragged_frame(frame, FrameHandle::BottomRight, Vector2::new(100.0, 0.0), true);
        assert_eq!(f, Frame::new(0.0, 0.0, 200.0, 100.0));

        // 左上角拖动时右下角不动
        let f = dragged_frame(frame, FrameHandle::TopLeft, Vector2::new(50.0, 0.0), true);
        assert_eq!(f, Frame::new(50.0, 25.0, 50.0, 25.0));
    }

    #[test]
    fn test_snap_and_constrain() {
        assert_eq!(snap_to_grid(Point2::new(74.0, 26.0), 50.0), Point2::new(50.0, 50.0));
        assert_eq!(snap_to_grid(Point2::new(74.0, 26.0), 0.0), Point2::new(74.0, 26.0));
        assert_eq!(constrain_axis(Vector2::new(3.0, -8.0)), Vector2::new(0.0, -8.0));
    }

    #[test]
    fn test_apply_drag_vertex_from_base() {
        let base = ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (50.0, 100.0)]);
        let gesture = EditGesture::new(Point2::new(50.0, 100.0), Point2::new(50.0, 150.0));
        let next = apply_drag(&base, EditTarget::Vertex(2), &gesture, 50.0, 10.0).unwrap();
        assert_eq!(next.frame(), Frame::new(0.0, 0.0, 100.0, 150.0));
        // 基准不变
        assert_eq!(base.frame().height, 100.0);
    }

    #[test]
    fn test_apply_drag_rejects_collapsed_frame() {
        let base =
            ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let gesture = EditGesture::new(Point2::new(100.0, 50.0), Point2::new(-20.0, 50.0));
        let result = apply_drag(&base, EditTarget::Frame(FrameHandle::Right), &gesture, 50.0, 1.0);
        assert!(matches!(result, Err(ZoneError::GeometryInvalid(_))));
    }

    async fn square_manager() -> (ZoneManager<MemoryStore>, ZoneId) {
        let mut m = ZoneManager::with_defaults(SceneId::new("edit"), MemoryStore::new());
        let square =
            ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let id = m.create(vec![square], CreateOptions::default()).await.unwrap()[0];
        (m, id)
    }

    #[tokio::test]
    async fn test_alt_drag_on_edge_inserts_vertex() {
        let (mut m, id) = square_manager().await;
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };
        let origin = Point2::new(100.0, 50.0);

        m.begin_edit(id, EditTarget::Edge(1), &EditGesture::press(origin).with_modifiers(alt))
            .unwrap();
        assert_eq!(
            m.edit_phase(),
            EditPhase::Drafting {
                zone: id,
                target: EditTarget::Vertex(2)
            }
        );
        let drag = EditGesture::new(origin, Point2::new(150.0, 50.0)).with_modifiers(alt);
        assert!(m.continue_edit(&drag).unwrap());
        assert_eq!(m.commit_edit().await.unwrap(), EditOutcome::Committed(id));

        let zone = m.get(id).unwrap();
        assert_eq!(zone.vertices().len(), 5);
        assert_eq!(zone.frame(), Frame::new(0.0, 0.0, 150.0, 100.0));

        m.undo().await.unwrap();
        assert_eq!(m.get(id).unwrap().vertices().len(), 4);
    }

    #[tokio::test]
    async fn test_modifiers_snap_and_constrain() {
        let (mut m, id) = square_manager().await;
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let origin = Point2::new(100.0, 100.0);
        m.begin_edit(id, EditTarget::Vertex(2), &EditGesture::press(origin))
            .unwrap();
        let drag = EditGesture::new(origin, Point2::new(128.0, 137.0)).with_modifiers(ctrl);
        assert!(m.continue_edit(&drag).unwrap());
        m.commit_edit().await.unwrap();
        assert_eq!(m.get(id).unwrap().frame(), Frame::new(0.0, 0.0, 150.0, 150.0));

        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        let origin = Point2::new(50.0, 50.0);
        m.begin_edit(id, EditTarget::Frame(FrameHandle::Body), &EditGesture::press(origin))
            .unwrap();
        let drag = EditGesture::new(origin, Point2::new(80.0, 55.0)).with_modifiers(shift);
        assert!(m.continue_edit(&drag).unwrap());
        assert_eq!(m.commit_edit().await.unwrap(), EditOutcome::Committed(id));
        assert_eq!(m.get(id).unwrap().frame().origin(), Point2::new(30.0, 0.0));
    }

    #[tokio::test]
    async fn test_edge_drag_and_idle_commit() {
        let (mut m, id) = square_manager().await;
        let origin = Point2::new(100.0, 50.0);

        assert!(matches!(
            m.continue_edit(&EditGesture::press(origin)),
            Err(ZoneError::NoActiveEdit)
        ));

        m.begin_edit(id, EditTarget::Edge(1), &EditGesture::press(origin))
            .unwrap();
        assert!(matches!(
            m.begin_edit(id, EditTarget::Edge(0), &EditGesture::press(origin)),
            Err(ZoneError::EditInProgress)
        ));
        assert_eq!(m.commit_edit().await.unwrap(), EditOutcome::Unchanged);
        assert_eq!(m.history().len(), 1);

        m.begin_edit(id, EditTarget::Edge(1), &EditGesture::press(origin))
            .unwrap();
        assert!(m.continue_edit(&EditGesture::new(origin, Point2::new(120.0, 50.0))).unwrap());
        m.commit_edit().await.unwrap();
        assert_eq!(m.get(id).unwrap().frame().width, 120.0);
        assert!(m.get(id).unwrap().is_persisted());
    }

    #[tokio::test]
    async fn test_vertex_dragged_onto_neighbour_merges() {
        let (mut m, id) = square_manager().await;
        let origin = Point2::new(100.0, 0.0);

        m.begin_edit(id, EditTarget::Vertex(1), &EditGesture::press(origin))
            .unwrap();
        assert!(m.continue_edit(&EditGesture::new(origin, Point2::new(0.3, 0.2))).unwrap());
        assert_eq!(m.commit_edit().await.unwrap(), EditOutcome::Committed(id));
        assert_eq!(m.get(id).unwrap().vertices().len(), 3);
        assert_eq!(m.get(id).unwrap().frame(), Frame::new(0.0, 0.0, 100.0, 100.0));

        m.undo().await.unwrap();
        assert_eq!(m.get(id).unwrap().vertices().len(), 4);
    }
}
