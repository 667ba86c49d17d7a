//! 基于场景文件的存储后端
//!
//! 每个场景对应根目录下的一个 `.zone` 文件。单条写入是"读取-修改-整体重写"，
//! 由一把异步锁串行化，所以同一批并发发出的写入不会互相覆盖。
//!
//! 文件名由场景名编码而来：ASCII 字母、数字和 `-` 原样保留，其余字节写成
//! `_XX`（十六进制），不同场景名不会映射到同一个文件。读取时还会核对文件
//! 元数据里的场景名。

use crate::error::FileError;
use crate::native::{self, SceneFile, SceneMetadata, DEFAULT_COMPRESSION_LEVEL, EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use zonal_core::error::StoreError;
use zonal_core::persistence::{decode_scene, ZoneStore};
use zonal_core::zone::{SceneId, ZoneId, ZoneRecord};

/// 文件存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// 场景文件根目录
    pub root: PathBuf,
    /// Zstd 压缩级别（1-22）
    pub compression_level: i32,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("scenes"),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// 文件存储
#[derive(Debug)]
pub struct FileStore {
    config: FileStoreConfig,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(config: FileStoreConfig) -> Self {
        Self {
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::new(FileStoreConfig {
            root: root.into(),
            ..FileStoreConfig::default()
        })
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// 场景文件路径
    pub fn path_for(&self, scene: &SceneId) -> PathBuf {
        let mut stem = String::with_capacity(scene.name().len());
        for byte in scene.name().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{:02X}", byte));
            }
        }
        self.config.root.join(format!("{}.{}", stem, EXTENSION))
    }

    /// 根目录下所有场景的元数据
    pub async fn list_scenes(&self) -> Result<Vec<SceneMetadata>, FileError> {
        let mut entries = match tokio::fs::read_dir(&self.config.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut scenes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(file) = native::load(&path).await? {
                scenes.push(file.metadata);
            }
        }
        scenes.sort_by(|a, b| a.scene.cmp(&b.scene));
        Ok(scenes)
    }

    /// 读取场景文件；文件属于其他场景时报错
    async fn open_scene(&self, scene: &SceneId) -> Result<Option<SceneFile>, FileError> {
        let path = self.path_for(scene);
        let Some(file) = native::load(&path).await? else {
            return Ok(None);
        };
        if &file.metadata.scene != scene {
            return Err(FileError::Corruption(format!(
                "{} holds scene '{}', expected '{}'",
                path.display(),
                file.metadata.scene,
                scene
            )));
        }
        Ok(Some(file))
    }

    async fn read_scene(&self, scene: &SceneId) -> Result<SceneFile, FileError> {
        Ok(self
            .open_scene(scene)
            .await?
            .unwrap_or_else(|| SceneFile::new(scene.clone())))
    }

    async fn write_scene(&self, path: &Path, file: &SceneFile) -> Result<(), FileError> {
        native::save(file, path, self.config.compression_level).await
    }
}

impl ZoneStore for FileStore {
    async fn load_all(&self, scene: &SceneId) -> Result<Vec<ZoneRecord>, StoreError> {
        match self.open_scene(scene).await? {
            Some(file) => decode_scene(file.zones.iter()),
            None => Ok(Vec::new()),
        }
    }

    async fn save_one(&self, scene: &SceneId, record: &ZoneRecord) -> Result<(), StoreError> {
        if record.is_volatile() {
            return Err(StoreError::VolatileRecord);
        }
        let attributes = record.to_attributes()?;

        let _guard = self.write_lock.lock().await;
        let mut file = self.read_scene(scene).await?;
        file.upsert(attributes, record.id());
        self.write_scene(&self.path_for(scene), &file).await?;
        Ok(())
    }

    async fn delete_one(&self, scene: &SceneId, id: ZoneId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut file) = self.open_scene(scene).await? else {
            return Ok(());
        };
        if file.remove(id) {
            self.write_scene(&self.path_for(scene), &file).await?;
        }
        Ok(())
    }

    async fn delete_all(&self, scene: &SceneId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        // 损坏的文件照样删除，只有属于其他场景的文件保留
        if let Ok(Some(file)) = native::load(&self.path_for(scene)).await {
            if &file.metadata.scene != scene {
                return Err(StoreError::Corruption(format!(
                    "refusing to delete file of scene '{}'",
                    file.metadata.scene
                )));
            }
        }
        match tokio::fs::remove_file(self.path_for(scene)).await {
            Ok(()) => {
                tracing::info!("Removed scene file for {}", scene);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileError::from(e).into()),
        }
    }
}
