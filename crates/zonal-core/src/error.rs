//! 错误定义

use crate::schema::FieldType;
use crate::zone::ZoneId;
use thiserror::Error;

/// 区域操作错误
#[derive(Error, Debug)]
pub enum ZoneError {
    /// 编辑会破坏多边形的简单性或最小间距
    #[error("Geometry invalid: {0}")]
    GeometryInvalid(String),

    /// 删除顶点被拒绝（需要提示用户）
    #[error("Vertex removal rejected: {0}")]
    RemovalRejected(String),

    #[error("Field '{field}' expects {expected:?}, got {found:?}")]
    SchemaTypeMismatch {
        field: String,
        expected: FieldType,
        found: FieldType,
    },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Vertex index {index} out of range (len {len})")]
    VertexIndex { index: usize, len: usize },

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("Zone already exists: {0}")]
    DuplicateId(ZoneId),

    #[error("Zone is locked: {0}")]
    Locked(ZoneId),

    #[error("Another edit is already in progress")]
    EditInProgress,

    #[error("No edit in progress")]
    NoActiveEdit,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 持久化失败；内存状态不回滚
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// 存储后端错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Refusing to store volatile zone")]
    VolatileRecord,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// 批量写入中部分失败
    #[error("{failed} of {total} writes failed: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: Box<StoreError>,
    },
}

pub type Result<T, E = ZoneError> = std::result::Result<T, E>;
