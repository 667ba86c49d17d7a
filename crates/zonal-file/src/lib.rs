//! Zonal 场景文件
//!
//! 支持：
//! - `.zone` 原生格式（MessagePack + Zstd，每个场景一个文件）
//! - 基于原生格式的 [`FileStore`] 存储后端
//! - JSON 导入/导出

pub mod error;
pub mod json;
pub mod native;
pub mod store;

pub use error::FileError;
pub use json::{export_json, import_json, JsonScene};
pub use native::{SceneFile, SceneMetadata};
pub use store::{FileStore, FileStoreConfig};
