//! 区域字段表
//!
//! 区域的所有可写字段登记在静态表 [`FIELDS`] 中。外部补丁（批量更新、
//! JSON 载荷）通过 [`FieldValue`] 写入，写入前按表中声明的类型校验。

use crate::error::ZoneError;
use crate::geometry::Vertex;
use crate::kind::KindAttributes;
use crate::zone::ZoneId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Integer,
    Number,
    Text,
    Vertices,
    Attributes,
}

/// 字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Vertices(Vec<Vertex>),
    Attributes(KindAttributes),
}

/// 字段声明
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// 写入后需要重新校验几何
    pub geometry: bool,
}

const fn field(name: &'static str, ty: FieldType, geometry: bool) -> FieldSpec {
    FieldSpec { name, ty, geometry }
}

/// 字段表
///
/// 顺序即补丁的应用顺序：外框先于顶点，
/// 这样同时包含两者的补丁最终以顶点为准。
pub static FIELDS: &[FieldSpec] = &[
    field("name", FieldType::Text, false),
    field("x", FieldType::Number, true),
    field("y", FieldType::Number, true),
    field("width", FieldType::Number, true),
    field("height", FieldType::Number, true),
    field("vertices", FieldType::Vertices, true),
    field("z_order", FieldType::Integer, false),
    field("enabled", FieldType::Bool, false),
    field("locked", FieldType::Bool, false),
    field("kind", FieldType::Text, false),
    field("kind_attributes", FieldType::Attributes, false),
];

/// 几何相关字段（撤销时整体捕获）
pub const GEOMETRY_FIELDS: [&str; 5] = ["x", "y", "width", "height", "vertices"];

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.name == name)
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Vertices(_) => FieldType::Vertices,
            FieldValue::Attributes(_) => FieldType::Attributes,
        }
    }

    /// 按声明类型收窄值；整数可以写入数值字段
    pub fn conform(self, field: &str, expected: FieldType) -> Result<FieldValue, ZoneError> {
        match (self, expected) {
            (FieldValue::Integer(i), FieldType::Number) => Ok(FieldValue::Number(i as f64)),
            (value, expected) if value.field_type() == expected => Ok(value),
            (value, expected) => Err(ZoneError::SchemaTypeMismatch {
                field: field.to_string(),
                expected,
                found: value.field_type(),
            }),
        }
    }

    /// 从 JSON 推断字段值
    pub fn from_json(field: &str, value: &Value) -> Result<FieldValue, ZoneError> {
        let invalid = |reason: String| ZoneError::InvalidValue {
            field: field.to_string(),
            reason,
        };

        match value {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(FieldValue::Integer(i)),
                None => n
                    .as_f64()
                    .map(FieldValue::Number)
                    .ok_or_else(|| invalid(format!("number {} out of range", n))),
            },
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Array(_) => serde_json::from_value::<Vec<Vertex>>(value.clone())
                .map(FieldValue::Vertices)
                .map_err(|e| invalid(e.to_string())),
            Value::Object(_) => serde_json::from_value::<KindAttributes>(value.clone())
                .map(FieldValue::Attributes)
                .map_err(|e| invalid(e.to_string())),
            Value::Null => Err(invalid("null is not a field value".to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Number(n) => Value::from(*n),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Vertices(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            FieldValue::Attributes(a) => serde_json::to_value(a).unwrap_or(Value::Null),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<Vertex>> for FieldValue {
    fn from(v: Vec<Vertex>) -> Self {
        FieldValue::Vertices(v)
    }
}

impl From<KindAttributes> for FieldValue {
    fn from(v: KindAttributes) -> Self {
        FieldValue::Attributes(v)
    }
}

/// 单个区域的字段补丁
#[derive(Debug, Clone, PartialEq)]
pub struct ZonePatch {
    pub id: ZoneId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl ZonePatch {
    pub fn new(id: ZoneId) -> Self {
        Self {
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 是否触及几何字段
    pub fn touches_geometry(&self) -> bool {
        self.fields
            .keys()
            .any(|k| field_spec(k).is_some_and(|f| f.geometry))
    }

    /// 从 JSON 对象解析补丁，`id` 字段必填
    ///
    /// 这里只做类型推断，字段名和类型的校验发生在写入时。
    pub fn from_json(value: &Value) -> Result<ZonePatch, ZoneError> {
        let object = value.as_object().ok_or_else(|| ZoneError::InvalidValue {
            field: "<patch>".to_string(),
            reason: "patch must be a JSON object".to_string(),
        })?;

        let id = object
            .get("id")
            .cloned()
            .ok_or_else(|| ZoneError::InvalidValue {
                field: "id".to_string(),
                reason: "missing".to_string(),
            })
            .and_then(|v| Ok(serde_json::from_value::<ZoneId>(v)?))?;

        let mut patch = ZonePatch::new(id);
        for (key, v) in object.iter().filter(|(k, _)| k.as_str() != "id") {
            patch.fields.insert(key.clone(), FieldValue::from_json(key, v)?);
        }
        Ok(patch)
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.to_json());
        }
        Value::Object(object)
    }
}
