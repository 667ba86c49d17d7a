//! 持久化接口
//!
//! 存储被视为按场景划分的扁平映射：区域ID → 序列化后的属性表。
//! 写入是整条记录替换，不做字段级合并；多个编辑者同时写同一条记录时
//! 后写者胜出。

use crate::error::StoreError;
use crate::zone::{SceneId, ZoneId, ZoneRecord};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use tokio::sync::RwLock;

/// 存储协作者，只由 [`ZoneManager`](crate::manager::ZoneManager) 调用
pub trait ZoneStore {
    /// 读取场景内的所有区域（按插入序号排序）
    fn load_all(
        &self,
        scene: &SceneId,
    ) -> impl Future<Output = Result<Vec<ZoneRecord>, StoreError>> + Send;

    /// 写入一条区域（整条替换）；易失区域必须拒绝
    fn save_one(
        &self,
        scene: &SceneId,
        record: &ZoneRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_one(
        &self,
        scene: &SceneId,
        id: ZoneId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_all(&self, scene: &SceneId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

type SceneMap = BTreeMap<ZoneId, Map<String, Value>>;

/// 内存存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    scenes: RwLock<HashMap<SceneId, SceneMap>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 场景内的记录数
    pub async fn len(&self, scene: &SceneId) -> usize {
        self.scenes.read().await.get(scene).map_or(0, |s| s.len())
    }

    pub async fn is_empty(&self, scene: &SceneId) -> bool {
        self.len(scene).await == 0
    }

    /// 读取一条原始属性表
    pub async fn attributes(&self, scene: &SceneId, id: ZoneId) -> Option<Map<String, Value>> {
        self.scenes.read().await.get(scene)?.get(&id).cloned()
    }
}

/// 把属性表反序列化并按插入序号排序
pub fn decode_scene<'a>(
    maps: impl IntoIterator<Item = &'a Map<String, Value>>,
) -> Result<Vec<ZoneRecord>, StoreError> {
    let mut records = maps
        .into_iter()
        .map(|m| ZoneRecord::from_attributes(m.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    records.sort_by_key(|r| r.seq());
    Ok(records)
}

impl ZoneStore for MemoryStore {
    async fn load_all(&self, scene: &SceneId) -> Result<Vec<ZoneRecord>, StoreError> {
        let scenes = self.scenes.read().await;
        match scenes.get(scene) {
            Some(zones) => decode_scene(zones.values()),
            None => Ok(Vec::new()),
        }
    }

    async fn save_one(&self, scene: &SceneId, record: &ZoneRecord) -> Result<(), StoreError> {
        if record.is_volatile() {
            return Err(StoreError::VolatileRecord);
        }
        let attributes = record.to_attributes()?;
        self.scenes
            .write()
            .await
            .entry(scene.clone())
            .or_default()
            .insert(record.id(), attributes);
        Ok(())
    }

    async fn delete_one(&self, scene: &SceneId, id: ZoneId) -> Result<(), StoreError> {
        if let Some(zones) = self.scenes.write().await.get_mut(scene) {
            zones.remove(&id);
        }
        Ok(())
    }

    async fn delete_all(&self, scene: &SceneId) -> Result<(), StoreError> {
        self.scenes.write().await.remove(scene);
        Ok(())
    }
}

/// 测试用存储：统计写入次数，可模拟写入失败
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    pub struct RecordingStore {
        pub inner: MemoryStore,
        pub fail_saves: AtomicBool,
        pub saves: AtomicUsize,
    }

    impl RecordingStore {
        pub fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        pub fn set_failing(&self, failing: bool) {
            self.fail_saves.store(failing, Ordering::SeqCst);
        }
    }

    impl ZoneStore for RecordingStore {
        async fn load_all(&self, scene: &SceneId) -> Result<Vec<ZoneRecord>, StoreError> {
            self.inner.load_all(scene).await
        }

        async fn save_one(&self, scene: &SceneId, record: &ZoneRecord) -> Result<(), StoreError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("disk offline".to_string()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_one(scene, record).await
        }

        async fn delete_one(&self, scene: &SceneId, id: ZoneId) -> Result<(), StoreError> {
            self.inner.delete_one(scene, id).await
        }

        async fn delete_all(&self, scene: &SceneId) -> Result<(), StoreError> {
            self.inner.delete_all(scene).await
        }
    }
}
