//! JSON 导入/导出
//!
//! 导出格式与原生文件同构：场景名、导出时间和区域属性表数组。

use crate::error::FileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zonal_core::zone::{SceneId, ZoneRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonScene {
    pub scene: SceneId,
    #[serde(default = "Utc::now")]
    pub exported: DateTime<Utc>,
    pub zones: Vec<Map<String, Value>>,
}

/// 导出为格式化的 JSON 文本
pub fn export_json(scene: &SceneId, records: &[ZoneRecord]) -> Result<String, FileError> {
    let document = JsonScene {
        scene: scene.clone(),
        exported: Utc::now(),
        zones: records
            .iter()
            .map(|r| r.to_attributes())
            .collect::<Result<_, _>>()?,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// 解析 JSON 文本
///
/// 只做反序列化；几何校验在交给管理器创建时进行。
pub fn import_json(text: &str) -> Result<(SceneId, Vec<ZoneRecord>), FileError> {
    let document: JsonScene = serde_json::from_str(text)?;
    let records = document
        .zones
        .into_iter()
        .map(ZoneRecord::from_attributes)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((document.scene, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonal_core::kind::ZoneKind;
    use zonal_core::zone::ZoneId;

    #[test]
    fn test_export_import() {
        let scene = SceneId::new("mill");
        let zones = vec![
            ZoneRecord::from_points(&[(0.0, 0.0), (30.0, 0.0), (15.0, 30.0)])
                .with_id(ZoneId::random())
                .with_kind(ZoneKind::Enclosed)
                .with_name("loft"),
        ];

        let text = export_json(&scene, &zones).unwrap();
        assert!(text.contains("\"enclosed\""));

        let (imported_scene, imported) = import_json(&text).unwrap();
        assert_eq!(imported_scene, scene);
        assert_eq!(imported, zones);
    }

    #[test]
    fn test_import_minimal_payload() {
        let text = r#"{
            "scene": "yard",
            "zones": [{
                "id": "00000000-0000-0000-0000-000000000000",
                "frame": {"x": 10.0, "y": 10.0, "width": 20.0, "height": 20.0},
                "vertices": [
                    {"x": 0, "y": 0},
                    {"x": 20, "y": 0},
                    {"x": 10, "y": 20, "permeable": true}
                ]
            }]
        }"#;
        let (_, zones) = import_json(text).unwrap();
        assert_eq!(zones.len(), 1);
        assert!(zones[0].is_volatile());
        assert!(zones[0].enabled());
        assert_eq!(zones[0].kind(), ZoneKind::Roofed);
        assert!(zones[0].vertices()[2].permeable);

        assert!(import_json(r#"{"scene": "yard"}"#).is_err());
    }
}
