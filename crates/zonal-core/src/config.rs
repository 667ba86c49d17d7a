//! 管理器配置

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// 撤销历史深度
    pub history_depth: usize,

    /// 顶点到非关联边的最小距离
    pub min_distance: f64,

    /// Ctrl 拖拽时的网格吸附间距
    pub grid_size: f64,

    /// 空间索引网格单元大小
    pub spatial_cell_size: f64,

    /// 粘贴时的默认偏移
    pub paste_offset: (f64, f64),
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            history_depth: 10,
            min_distance: 10.0,
            grid_size: 50.0,
            spatial_cell_size: 200.0,
            paste_offset: (50.0, 50.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{"min_distance": 2.5}"#).unwrap();
        assert_eq!(config.min_distance, 2.5);
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.paste_offset, (50.0, 50.0));
    }
}
