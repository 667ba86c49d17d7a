//! 文件操作错误定义

use thiserror::Error;
use zonal_core::error::StoreError;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),
}

/// 存储接口只认 [`StoreError`]
impl From<FileError> for StoreError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Io(e) => StoreError::Io(e.to_string()),
            FileError::Json(e) => StoreError::Serialization(e),
            other => StoreError::Corruption(other.to_string()),
        }
    }
}
