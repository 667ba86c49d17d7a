//! 区域记录
//!
//! 一个区域 = 标识 + 外框 + 顶点列表 + 类型属性 + 启用/锁定标记。
//!
//! 顶点坐标相对于外框左上角 `(frame.x, frame.y)`。每次规范化之后外框都是
//! 顶点的紧包围盒，且最小顶点坐标为 `(0, 0)`。
//!
//! 所有修改方法都会设置 `dirty`；几何修改失败时记录保持原样。

use crate::error::ZoneError;
use crate::geometry::{self, Vertex, MAX_VERTICES, MIN_VERTICES};
use crate::kind::{KindAttributes, ZoneKind};
use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use crate::schema::{field_spec, FieldValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// 区域ID
///
/// 尚未持久化的区域使用空 UUID 作为"易失"标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(Uuid);

impl ZoneId {
    pub fn volatile() -> Self {
        Self(Uuid::nil())
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn is_volatile(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 场景ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// 区域外框
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    pub fn bbox(&self) -> BoundingBox2 {
        BoundingBox2::from_rect(self.x, self.y, self.width, self.height)
    }
}

/// 区域记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneRecord {
    id: ZoneId,
    #[serde(default)]
    name: String,
    frame: Frame,
    vertices: Vec<Vertex>,
    #[serde(default)]
    z_order: i64,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    kind: ZoneKind,
    #[serde(default)]
    kind_attributes: KindAttributes,
    /// 插入序号，z_order 相同时用于排序
    #[serde(default)]
    seq: u64,

    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    flush_pending: bool,
    /// 多点绘制进行中（保留首尾重合点）
    #[serde(skip)]
    drafting: bool,
}

fn default_true() -> bool {
    true
}

impl ZoneRecord {
    /// 由场景坐标下的顶点创建易失区域
    pub fn new(vertices: Vec<Vertex>) -> Self {
        let kind = ZoneKind::default();
        let mut record = Self {
            id: ZoneId::volatile(),
            name: String::new(),
            frame: Frame::default(),
            vertices,
            z_order: 0,
            enabled: true,
            locked: false,
            kind,
            kind_attributes: kind.default_attributes(),
            seq: 0,
            dirty: true,
            flush_pending: false,
            drafting: false,
        };
        record.normalize(false);
        record
    }

    /// 由场景坐标点创建（所有边不可穿透）
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        Self::new(points.iter().map(|&(x, y)| Vertex::new(x, y)).collect())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: ZoneKind) -> Self {
        self.kind = kind;
        self.kind_attributes = kind.default_attributes();
        self
    }

    pub fn with_attribute(mut self, key: &str, value: f64) -> Self {
        self.kind_attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_z_order(mut self, z_order: i64) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_id(mut self, id: ZoneId) -> Self {
        self.id = id;
        self
    }

    // === 访问器 ===

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn z_order(&self) -> i64 {
        self.z_order
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    pub fn kind_attributes(&self) -> &KindAttributes {
        &self.kind_attributes
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_volatile(&self) -> bool {
        self.id.is_volatile()
    }

    /// 已持久化 = 非易失且与存储一致
    pub fn is_persisted(&self) -> bool {
        !self.dirty && !self.is_volatile()
    }

    pub fn flush_pending(&self) -> bool {
        self.flush_pending
    }

    pub fn is_drafting(&self) -> bool {
        self.drafting
    }

    /// 场景坐标下的顶点
    pub fn scene_vertex(&self, index: usize) -> Option<Point2> {
        self.vertices
            .get(index)
            .map(|v| Point2::new(self.frame.x + v.x, self.frame.y + v.y))
    }

    pub fn scene_vertices(&self) -> impl Iterator<Item = Point2> + '_ {
        self.vertices
            .iter()
            .map(move |v| Point2::new(self.frame.x + v.x, self.frame.y + v.y))
    }

    /// 场景坐标 → 局部坐标
    pub fn to_local(&self, point: Point2) -> Point2 {
        Point2::new(point.x - self.frame.x, point.y - self.frame.y)
    }

    /// 场景坐标点是否在多边形内
    pub fn contains(&self, point: Point2) -> bool {
        self.frame.bbox().contains(&point)
            && geometry::contains_point(&self.vertices, self.to_local(point))
    }

    // === 内部状态 ===

    pub(crate) fn assign_id(&mut self, id: ZoneId) {
        self.id = id;
        self.dirty = true;
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub(crate) fn set_drafting(&mut self, drafting: bool) {
        self.drafting = drafting;
    }

    pub(crate) fn set_flush_pending(&mut self, pending: bool) {
        self.flush_pending = pending;
    }

    /// 存储确认写入后调用
    pub fn mark_persisted(&mut self) {
        self.dirty = false;
        self.flush_pending = false;
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // === 几何编辑 ===

    /// 校验不变量：顶点数范围、简单多边形、最小间距
    pub fn validate(&self, min_distance: f64) -> Result<(), ZoneError> {
        check_candidate(&self.vertices, min_distance)
    }

    /// 移动单个顶点（局部坐标）
    ///
    /// 与相邻顶点重合时两者合并。移动后多边形无效时记录不变并返回 `GeometryInvalid`。
    pub fn move_vertex(
        &mut self,
        index: usize,
        position: Point2,
        min_distance: f64,
    ) -> Result<(), ZoneError> {
        let len = self.vertices.len();
        if index >= len {
            return Err(ZoneError::VertexIndex { index, len });
        }
        let mut candidate = self.vertices.clone();
        candidate[index].x = position.x;
        candidate[index].y = position.y;
        self.replace_vertices(candidate, min_distance)
    }

    /// 平移一条边（顶点 index 到 index+1）
    pub fn move_edge(
        &mut self,
        index: usize,
        delta: Vector2,
        min_distance: f64,
    ) -> Result<(), ZoneError> {
        let len = self.vertices.len();
        if index >= len {
            return Err(ZoneError::VertexIndex { index, len });
        }
        let mut candidate = self.vertices.clone();
        for i in [index, (index + 1) % len] {
            candidate[i] = candidate[i].translated(delta.x, delta.y);
        }
        self.replace_vertices(candidate, min_distance)
    }

    /// 在 `after_index` 之后插入顶点（局部坐标）
    ///
    /// 新顶点继承被拆分边的 `permeable`。调用方随后负责规范化。
    pub fn insert_vertex(
        &mut self,
        after_index: usize,
        position: Point2,
        min_distance: f64,
    ) -> Result<(), ZoneError> {
        let len = self.vertices.len();
        if after_index >= len {
            return Err(ZoneError::VertexIndex {
                index: after_index,
                len,
            });
        }
        if len >= MAX_VERTICES {
            return Err(ZoneError::GeometryInvalid(format!(
                "zone already has the maximum of {} vertices",
                MAX_VERTICES
            )));
        }

        let permeable = self.vertices[after_index].permeable;
        let mut candidate = self.vertices.clone();
        candidate.insert(
            after_index + 1,
            Vertex::with_permeable(position.x, position.y, permeable),
        );
        self.replace_vertices(candidate, min_distance)
    }

    /// 删除顶点
    ///
    /// 顶点数会低于下限或剩余多边形无效时拒绝，记录不变。
    pub fn remove_vertex(&mut self, index: usize, min_distance: f64) -> Result<(), ZoneError> {
        let len = self.vertices.len();
        if index >= len {
            return Err(ZoneError::VertexIndex { index, len });
        }
        if len <= MIN_VERTICES {
            return Err(ZoneError::RemovalRejected(format!(
                "a zone needs at least {} vertices",
                MIN_VERTICES
            )));
        }

        let mut candidate = self.vertices.clone();
        candidate.remove(index);
        self.replace_vertices(candidate, min_distance)
            .map_err(|_| {
                ZoneError::RemovalRejected(
                    "the remaining shape would intersect itself".to_string(),
                )
            })
    }

    /// 去除重复顶点、校验后整体替换顶点
    pub fn replace_vertices(
        &mut self,
        candidate: Vec<Vertex>,
        min_distance: f64,
    ) -> Result<(), ZoneError> {
        let candidate = geometry::dedup_vertices(&candidate, self.drafting);
        check_candidate(&candidate, min_distance)?;
        self.vertices = candidate;
        self.mark_dirty();
        Ok(())
    }

    /// 整体平移（总是有效）
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.frame.x += dx;
        self.frame.y += dy;
        self.mark_dirty();
    }

    /// 把顶点缩放进新外框
    pub fn resize(&mut self, target: Frame, min_distance: f64) -> Result<(), ZoneError> {
        if self.frame.width < EPSILON || self.frame.height < EPSILON {
            return Err(ZoneError::GeometryInvalid("cannot scale a degenerate frame".to_string()));
        }
        if target.width < EPSILON || target.height < EPSILON {
            return Err(ZoneError::GeometryInvalid("frame would collapse".to_string()));
        }

        let sx = target.width / self.frame.width;
        let sy = target.height / self.frame.height;
        let candidate = self
            .vertices
            .iter()
            .map(|v| Vertex::with_permeable(v.x * sx, v.y * sy, v.permeable))
            .collect();
        self.replace_vertices(candidate, min_distance)?;
        self.frame = target;
        Ok(())
    }

    /// 规范化：去重、重算外框、顶点重定位
    ///
    /// `schedule_flush` 为 false 时只更新内存（拖拽中），不安排持久化。
    pub fn normalize(&mut self, schedule_flush: bool) {
        let normalized = geometry::normalize(&self.vertices, self.drafting);
        self.frame = Frame {
            x: self.frame.x + normalized.min_x,
            y: self.frame.y + normalized.min_y,
            width: normalized.width,
            height: normalized.height,
        };
        self.vertices = normalized.vertices;
        self.mark_dirty();
        if schedule_flush {
            self.flush_pending = true;
        }
    }

    /// 深拷贝，但不带ID（可用于预览或复制粘贴）
    pub fn clone_volatile(&self) -> ZoneRecord {
        let mut copy = self.clone();
        copy.id = ZoneId::volatile();
        copy.seq = 0;
        copy.dirty = true;
        copy.flush_pending = false;
        copy
    }

    // === 字段访问 ===

    pub fn get_field(&self, name: &str) -> Result<FieldValue, ZoneError> {
        let value = match name {
            "name" => FieldValue::Text(self.name.clone()),
            "x" => FieldValue::Number(self.frame.x),
            "y" => FieldValue::Number(self.frame.y),
            "width" => FieldValue::Number(self.frame.width),
            "height" => FieldValue::Number(self.frame.height),
            "vertices" => FieldValue::Vertices(self.vertices.clone()),
            "z_order" => FieldValue::Integer(self.z_order),
            "enabled" => FieldValue::Bool(self.enabled),
            "locked" => FieldValue::Bool(self.locked),
            "kind" => FieldValue::Text(self.kind.name().to_string()),
            "kind_attributes" => FieldValue::Attributes(self.kind_attributes.clone()),
            other => return Err(ZoneError::UnknownField(other.to_string())),
        };
        Ok(value)
    }

    /// 类型校验后写入字段
    ///
    /// 不做几何校验；几何字段写完后由调用方规范化并校验。
    /// 改写 `width`/`height` 会按比例缩放顶点。
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), ZoneError> {
        let spec = field_spec(name).ok_or_else(|| ZoneError::UnknownField(name.to_string()))?;
        let value = value.conform(name, spec.ty)?;

        match (name, value) {
            ("name", FieldValue::Text(s)) => self.name = s,
            ("x", FieldValue::Number(n)) => self.frame.x = n,
            ("y", FieldValue::Number(n)) => self.frame.y = n,
            ("width", FieldValue::Number(n)) => {
                if self.frame.width >= EPSILON {
                    let s = n / self.frame.width;
                    self.vertices.iter_mut().for_each(|v| v.x *= s);
                }
                self.frame.width = n;
            }
            ("height", FieldValue::Number(n)) => {
                if self.frame.height >= EPSILON {
                    let s = n / self.frame.height;
                    self.vertices.iter_mut().for_each(|v| v.y *= s);
                }
                self.frame.height = n;
            }
            ("vertices", FieldValue::Vertices(v)) => self.vertices = v,
            ("z_order", FieldValue::Integer(i)) => self.z_order = i,
            ("enabled", FieldValue::Bool(b)) => self.enabled = b,
            ("locked", FieldValue::Bool(b)) => self.locked = b,
            ("kind", FieldValue::Text(s)) => {
                self.kind = s.parse().map_err(|reason| ZoneError::InvalidValue {
                    field: name.to_string(),
                    reason,
                })?;
            }
            ("kind_attributes", FieldValue::Attributes(a)) => self.kind_attributes = a,
            (field, value) => {
                return Err(ZoneError::SchemaTypeMismatch {
                    field: field.to_string(),
                    expected: spec.ty,
                    found: value.field_type(),
                })
            }
        }

        self.mark_dirty();
        Ok(())
    }

    // === 属性表序列化 ===

    pub fn to_attributes(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "zone serialized to {} instead of an object",
                other
            ))),
        }
    }

    /// 从属性表恢复；视为与存储一致（非 dirty）
    pub fn from_attributes(
        attributes: Map<String, Value>,
    ) -> Result<ZoneRecord, serde_json::Error> {
        let mut record: ZoneRecord = serde_json::from_value(Value::Object(attributes))?;
        record.mark_persisted();
        Ok(record)
    }
}

/// 比较内容，忽略 dirty 等内部状态
impl PartialEq for ZoneRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.frame == other.frame
            && self.vertices == other.vertices
            && self.z_order == other.z_order
            && self.enabled == other.enabled
            && self.locked == other.locked
            && self.kind == other.kind
            && self.kind_attributes == other.kind_attributes
            && self.seq == other.seq
    }
}

fn check_candidate(vertices: &[Vertex], min_distance: f64) -> Result<(), ZoneError> {
    let n = vertices.len();
    if n < MIN_VERTICES || n > MAX_VERTICES {
        return Err(ZoneError::GeometryInvalid(format!(
            "vertex count {} outside {}..={}",
            n, MIN_VERTICES, MAX_VERTICES
        )));
    }
    if !geometry::is_simple_polygon(vertices, min_distance) {
        return Err(ZoneError::GeometryInvalid(
            "polygon intersects itself or is pinched below the minimum distance".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn triangle() -> ZoneRecord {
        ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (50.0, 100.0)])
    }

    fn square() -> ZoneRecord {
        ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)])
    }

    #[test]
    fn test_new_normalizes_frame() {
        let zone = ZoneRecord::from_points(&[(10.0, 20.0), (110.0, 20.0), (60.0, 70.0)]);
        assert_eq!(zone.frame(), Frame::new(10.0, 20.0, 100.0, 50.0));
        assert_eq!(zone.vertices()[0].point(), Point2::new(0.0, 0.0));
        assert!(zone.is_volatile());
        assert!(!zone.is_persisted());
    }

    #[test]
    fn test_triangle_apex_move_shrinks_frame() {
        let mut zone = triangle();
        zone.move_vertex(2, Point2::new(50.0, 5.0), 10.0).unwrap();
        zone.normalize(true);
        assert_eq!(zone.frame(), Frame::new(0.0, 0.0, 100.0, 5.0));
        assert!(zone.flush_pending());
    }

    #[test]
    fn test_collapsing_square_vertex_is_rejected() {
        let mut zone = square();
        let before = zone.vertices().to_vec();
        let result = zone.move_vertex(0, Point2::new(100.0, 100.0), 1.0);
        assert!(matches!(result, Err(ZoneError::GeometryInvalid(_))));
        assert_eq!(zone.vertices(), before.as_slice());
    }

    #[test]
    fn test_vertex_dragged_onto_neighbour_merges() {
        let mut zone = ZoneRecord::new(vec![
            Vertex::new(0.0, 0.0),
            Vertex::with_permeable(100.0, 0.0, true),
            Vertex::new(150.0, 80.0),
            Vertex::new(50.0, 150.0),
            Vertex::new(-50.0, 80.0),
        ]);
        zone.move_vertex(1, zone.to_local(Point2::new(0.2, 0.0)), 10.0).unwrap();
        zone.normalize(false);
        assert_eq!(zone.vertices().len(), 4);
        assert!(zone.vertices()[0].permeable);
        assert!(zone.validate(10.0).is_ok());

        let mut small = triangle();
        let before = small.vertices().to_vec();
        let result = small.move_vertex(1, Point2::new(0.3, 0.0), 10.0);
        assert!(matches!(result, Err(ZoneError::GeometryInvalid(_))));
        assert_eq!(small.vertices(), before.as_slice());
    }

    #[test]
    fn test_move_sequence_never_leaves_invalid_state() {
        let mut zone = square();
        let moves = [
            (1, (150.0, -20.0)),
            (3, (100.0, 0.0)),
            (2, (-50.0, 50.0)),
            (0, (20.0, 20.0)),
            (2, (100.0, 100.0)),
        ];
        for (index, (x, y)) in moves {
            let before = zone.vertices().to_vec();
            match zone.move_vertex(index, Point2::new(x, y), 5.0) {
                Ok(()) => assert!(zone.validate(5.0).is_ok()),
                Err(_) => assert_eq!(zone.vertices(), before.as_slice()),
            }
            zone.normalize(false);
            assert!(zone.validate(5.0).is_ok());
            let f = zone.frame();
            let bbox = geometry::bounding_box(zone.vertices());
            assert!(bbox.min.x.abs() < EPSILON && bbox.min.y.abs() < EPSILON);
            assert!((bbox.width() - f.width).abs() < EPSILON);
            assert!((bbox.height() - f.height).abs() < EPSILON);
        }
    }

    #[test]
    fn test_insert_vertex_inherits_permeability() {
        let mut zone = square();
        zone.vertices[1].permeable = true;
        zone.insert_vertex(1, Point2::new(130.0, 50.0), 1.0).unwrap();
        assert_eq!(zone.vertices().len(), 5);
        assert!(zone.vertices()[2].permeable);

        // 插到正方形内部并穿过对边 → 拒绝
        let before = zone.vertices().to_vec();
        assert!(zone.insert_vertex(3, Point2::new(50.0, -50.0), 1.0).is_err());
        assert_eq!(zone.vertices(), before.as_slice());
    }

    #[test]
    fn test_remove_vertex_from_triangle_rejected() {
        let mut zone = triangle();
        let result = zone.remove_vertex(0, 1.0);
        assert!(matches!(result, Err(ZoneError::RemovalRejected(_))));
        assert_eq!(zone.vertices().len(), 3);
    }

    #[test]
    fn test_remove_vertex_that_would_self_intersect() {
        // 去掉顶点 1 后 (0,0)->(100,100) 会穿过凹口附近的边
        let mut zone = ZoneRecord::from_points(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 100.0),
            (60.0, 40.0),
            (0.0, 100.0),
        ]);
        let before = zone.clone();
        let result = zone.remove_vertex(1, 1.0);
        assert!(matches!(result, Err(ZoneError::RemovalRejected(_))));
        assert_eq!(zone, before);

        // 去掉凹口顶点是合法的
        zone.remove_vertex(3, 1.0).unwrap();
        assert_eq!(zone.vertices().len(), 4);
    }

    #[test]
    fn test_resize_scales_vertices() {
        let mut zone = square();
        zone.resize(Frame::new(10.0, 10.0, 50.0, 200.0), 1.0).unwrap();
        zone.normalize(false);
        assert_eq!(zone.frame(), Frame::new(10.0, 10.0, 50.0, 200.0));
        assert_eq!(zone.vertices()[2].point(), Point2::new(50.0, 200.0));
        assert!(zone.resize(Frame::new(0.0, 0.0, 0.0, 10.0), 1.0).is_err());
    }

    #[test]
    fn test_clone_volatile_drops_id() {
        let zone = square().with_id(ZoneId::random());
        let copy = zone.clone_volatile();
        assert!(copy.is_volatile());
        assert_eq!(copy.vertices(), zone.vertices());
        assert_eq!(copy.frame(), zone.frame());
    }

    #[test]
    fn test_set_field_type_mismatch() {
        let mut zone = square();
        let err = zone.set_field("enabled", FieldValue::Number(1.0)).unwrap_err();
        assert!(matches!(
            err,
            ZoneError::SchemaTypeMismatch {
                expected: FieldType::Bool,
                found: FieldType::Number,
                ..
            }
        ));
        assert!(zone.enabled());

        assert!(matches!(
            zone.set_field("colour", FieldValue::Bool(true)),
            Err(ZoneError::UnknownField(_))
        ));
        assert!(matches!(
            zone.set_field("kind", "attic".into()),
            Err(ZoneError::InvalidValue { .. })
        ));

        zone.set_field("kind", "enclosed".into()).unwrap();
        zone.set_field("x", FieldValue::Integer(7)).unwrap();
        assert_eq!(zone.kind(), ZoneKind::Enclosed);
        assert_eq!(zone.frame().x, 7.0);
        assert_eq!(zone.get_field("x").unwrap(), FieldValue::Number(7.0));
    }

    #[test]
    fn test_attributes_roundtrip_clears_dirty() {
        let zone = square()
            .with_id(ZoneId::random())
            .with_name("porch")
            .with_kind(ZoneKind::Roofed);
        assert!(zone.is_dirty());
        let attrs = zone.to_attributes().unwrap();
        assert_eq!(attrs["kind"], Value::String("roofed".to_string()));
        assert!(!attrs.contains_key("dirty"));

        let restored = ZoneRecord::from_attributes(attrs).unwrap();
        assert_eq!(restored, zone);
        assert!(restored.is_persisted());
    }

    #[test]
    fn test_contains_scene_point() {
        let zone = ZoneRecord::from_points(&[(100.0, 100.0), (200.0, 100.0), (150.0, 200.0)]);
        assert!(zone.contains(Point2::new(150.0, 150.0)));
        assert!(!zone.contains(Point2::new(110.0, 190.0)));
        assert!(!zone.contains(Point2::new(50.0, 50.0)));
    }
}
