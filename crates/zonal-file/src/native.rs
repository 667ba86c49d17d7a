//! 原生场景文件格式（.zone）
//!
//! 文件头（16 字节）之后是 Zstd 压缩的 MessagePack 数据。
//! 区域以属性表形式保存，与 JSON 载荷同构，新增字段不会破坏旧文件。

use crate::error::FileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use zonal_core::zone::{SceneId, ZoneId, ZoneRecord};

/// 文件魔数 "ZONE"
const MAGIC: &[u8; 4] = b"ZONE";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// 文件头长度
const HEADER_LEN: usize = 16;

/// Zstd 默认压缩级别
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// 文件扩展名
pub const EXTENSION: &str = "zone";

/// 文件头：魔数 | 版本 | 标志位 | 压缩数据长度，均为小端 u32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    version: u32,
    /// 预留
    flags: u32,
    compressed_size: u32,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(MAGIC);
        let words = [self.version, self.flags, self.compressed_size];
        for (slot, word) in words.into_iter().enumerate() {
            let at = 4 + slot * 4;
            bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// 解析头部，返回头部和其后的数据
    fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), FileError> {
        if bytes.len() < HEADER_LEN {
            return Err(FileError::Corruption(format!(
                "file is {} bytes, shorter than the {}-byte header",
                bytes.len(),
                HEADER_LEN
            )));
        }
        let (head, body) = bytes.split_at(HEADER_LEN);
        if &head[..4] != MAGIC {
            return Err(FileError::InvalidFormat("not a zone scene file".to_string()));
        }
        let word = |slot: usize| {
            let at = 4 + slot * 4;
            u32::from_le_bytes([head[at], head[at + 1], head[at + 2], head[at + 3]])
        };
        let header = Self {
            version: word(0),
            flags: word(1),
            compressed_size: word(2),
        };
        Ok((header, body))
    }
}

/// 场景元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub scene: SceneId,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// 写入程序及版本
    pub generator: String,
}

impl SceneMetadata {
    pub fn new(scene: SceneId) -> Self {
        let now = Utc::now();
        Self {
            scene,
            created: now,
            modified: now,
            generator: format!("zonal {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// 场景文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    pub metadata: SceneMetadata,
    /// 区域属性表（按写入顺序）
    pub zones: Vec<Map<String, Value>>,
}

impl SceneFile {
    pub fn new(scene: SceneId) -> Self {
        Self {
            metadata: SceneMetadata::new(scene),
            zones: Vec::new(),
        }
    }

    fn position(&self, id: ZoneId) -> Option<usize> {
        let key = Value::String(id.to_string());
        self.zones.iter().position(|z| z.get("id") == Some(&key))
    }

    /// 写入或替换一条记录
    pub fn upsert(&mut self, attributes: Map<String, Value>, id: ZoneId) {
        match self.position(id) {
            Some(index) => self.zones[index] = attributes,
            None => self.zones.push(attributes),
        }
        self.metadata.modified = Utc::now();
    }

    pub fn remove(&mut self, id: ZoneId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.zones.remove(index);
        self.metadata.modified = Utc::now();
        true
    }

    /// 反序列化全部区域（按插入序号排序）
    pub fn records(&self) -> Result<Vec<ZoneRecord>, FileError> {
        let mut records = self
            .zones
            .iter()
            .map(|m| ZoneRecord::from_attributes(m.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.seq());
        Ok(records)
    }
}

/// 编码为文件字节
pub fn encode(file: &SceneFile, compression_level: i32) -> Result<Vec<u8>, FileError> {
    let msgpack_data = rmp_serde::to_vec(file)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), compression_level)?;

    let compressed_size = u32::try_from(compressed_data.len())
        .map_err(|_| FileError::InvalidFormat("scene too large for a zone file".to_string()))?;

    let header = FileHeader {
        version: FORMAT_VERSION,
        flags: 0,
        compressed_size,
    };
    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed_data.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&compressed_data);
    Ok(bytes)
}

/// 从文件字节解码
pub fn decode(bytes: &[u8]) -> Result<SceneFile, FileError> {
    let (header, body) = FileHeader::parse(bytes)?;

    if header.version > FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(format!(
            "File version {} is newer than supported version {}",
            header.version, FORMAT_VERSION
        )));
    }

    if header.flags != 0 {
        tracing::debug!("Ignoring reserved header flags {:#x}", header.flags);
    }

    let size = header.compressed_size as usize;
    let Some(compressed) = body.get(..size) else {
        return Err(FileError::Corruption(format!(
            "expected {} compressed bytes, found {}",
            size,
            body.len()
        )));
    };

    let msgpack_data = zstd::decode_all(compressed)?;
    Ok(rmp_serde::from_slice(&msgpack_data)?)
}

/// 保存场景文件（先写临时文件再重命名）
pub async fn save(file: &SceneFile, path: &Path, compression_level: i32) -> Result<(), FileError> {
    let bytes = encode(file, compression_level)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension(format!("{}.tmp", EXTENSION));
    let mut tmp = tokio::fs::File::create(&tmp_path).await?;
    tmp.write_all(&bytes).await?;
    tmp.sync_all().await?;
    drop(tmp);
    tokio::fs::rename(&tmp_path, path).await?;

    tracing::debug!(
        "Saved {} zones to {} ({} bytes)",
        file.zones.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// 加载场景文件；文件不存在时返回 `None`
pub async fn load(path: &Path) -> Result<Option<SceneFile>, FileError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file = decode(&bytes)?;

    tracing::debug!("Loaded {} zones from {}", file.zones.len(), path.display());
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zonal_core::kind::ZoneKind;

    fn sample() -> SceneFile {
        let mut file = SceneFile::new(SceneId::new("harbour"));
        let zone = ZoneRecord::from_points(&[(0.0, 0.0), (80.0, 0.0), (40.0, 60.0)])
            .with_id(ZoneId::random())
            .with_name("pier")
            .with_kind(ZoneKind::Outside);
        file.upsert(zone.to_attributes().unwrap(), zone.id());
        file
    }

    #[test]
    fn test_encode_decode() {
        let file = sample();
        let bytes = encode(&file, DEFAULT_COMPRESSION_LEVEL).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, file);
        let records = decoded.records().unwrap();
        assert_eq!(records[0].name(), "pier");
        assert!(records[0].is_persisted());
    }

    #[test]
    fn test_header_layout() {
        let header = FileHeader {
            version: FORMAT_VERSION,
            flags: 0x0102,
            compressed_size: 7,
        };
        let mut bytes = header.to_bytes().to_vec();
        assert_eq!(&bytes[8..12], &[0x02, 0x01, 0, 0]);
        assert_eq!(&bytes[12..16], &[7, 0, 0, 0]);

        bytes.extend_from_slice(b"payload");
        let (parsed, body) = FileHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(body, b"payload");
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = b"XXXX".to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(matches!(decode(&bytes), Err(FileError::InvalidFormat(_))));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = encode(&sample(), DEFAULT_COMPRESSION_LEVEL).unwrap();
        bytes[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        assert!(matches!(decode(&bytes), Err(FileError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_truncated_file() {
        let bytes = encode(&sample(), DEFAULT_COMPRESSION_LEVEL).unwrap();
        assert!(matches!(decode(&bytes[..bytes.len() - 3]), Err(FileError::Corruption(_))));
        assert!(matches!(decode(&bytes[..10]), Err(FileError::Corruption(_))));
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut file = sample();
        let mut record = file.records().unwrap().remove(0);
        let id = record.id();
        record = record.with_name("jetty");
        file.upsert(record.to_attributes().unwrap(), id);
        assert_eq!(file.zones.len(), 1);
        assert_eq!(file.records().unwrap()[0].name(), "jetty");

        assert!(file.remove(id));
        assert!(!file.remove(id));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("harbour.zone");
        let file = sample();

        save(&file, &path, DEFAULT_COMPRESSION_LEVEL).await.unwrap();
        assert!(!path.with_extension("zone.tmp").exists());

        let loaded = load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, file);
        assert!(load(&dir.path().join("missing.zone")).await.unwrap().is_none());
    }
}
