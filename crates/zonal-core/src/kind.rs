//! 区域类型与环境过滤
//!
//! 区域类型决定它如何改写环境状态（天气、光照、环境音）。
//! 环境模拟本身不在本 crate 内，这里只定义过滤接口和一个默认实现。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 类型专属数值属性（如 `feather` 羽化百分比）
pub type KindAttributes = BTreeMap<String, f64>;

/// 羽化百分比属性名
pub const FEATHER_ATTRIBUTE: &str = "feather";

/// 区域类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    /// 露天（不改写）
    Outside,
    /// 有顶棚：挡雨
    #[default]
    Roofed,
    /// 封闭：挡雨挡风，环境音减弱
    Enclosed,
    /// 地下：无天气、无自然光
    Subterranean,
}

impl ZoneKind {
    pub const ALL: [ZoneKind; 4] = [
        ZoneKind::Outside,
        ZoneKind::Roofed,
        ZoneKind::Enclosed,
        ZoneKind::Subterranean,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ZoneKind::Outside => "outside",
            ZoneKind::Roofed => "roofed",
            ZoneKind::Enclosed => "enclosed",
            ZoneKind::Subterranean => "subterranean",
        }
    }

    /// 该类型的默认属性
    pub fn default_attributes(&self) -> KindAttributes {
        let mut attrs = KindAttributes::new();
        match self {
            ZoneKind::Outside => {}
            ZoneKind::Roofed | ZoneKind::Enclosed | ZoneKind::Subterranean => {
                attrs.insert(FEATHER_ATTRIBUTE.to_string(), 0.0);
            }
        }
        attrs
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for ZoneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown zone kind '{}'", s))
    }
}

/// 环境状态
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientState {
    /// 降水强度 0..=1
    pub precipitation: f64,
    /// 风速 0..=1
    pub wind: f64,
    /// 自然光照 0..=1
    pub light: f64,
    /// 环境音量 0..=1
    pub volume: f64,
}

impl AmbientState {
    /// 线性混合：`weight` 为 0 时得到 self，为 1 时得到 other
    pub fn blend(&self, other: &AmbientState, weight: f64) -> AmbientState {
        let w = weight.clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a + (b - a) * w;
        AmbientState {
            precipitation: mix(self.precipitation, other.precipitation),
            wind: mix(self.wind, other.wind),
            light: mix(self.light, other.light),
            volume: mix(self.volume, other.volume),
        }
    }
}

impl Default for AmbientState {
    fn default() -> Self {
        Self {
            precipitation: 0.0,
            wind: 0.0,
            light: 1.0,
            volume: 1.0,
        }
    }
}

/// 环境过滤器：把全局环境状态转换为区域内的局部状态
///
/// 必须是纯函数，不得修改区域。
pub trait AmbientFilter {
    fn filter(
        &self,
        kind: ZoneKind,
        attributes: &KindAttributes,
        ambient: &AmbientState,
    ) -> AmbientState;
}

/// 按区域类型的默认过滤器
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileFilter;

impl AmbientFilter for ProfileFilter {
    fn filter(
        &self,
        kind: ZoneKind,
        _attributes: &KindAttributes,
        ambient: &AmbientState,
    ) -> AmbientState {
        match kind {
            ZoneKind::Outside => *ambient,
            ZoneKind::Roofed => AmbientState {
                precipitation: 0.0,
                ..*ambient
            },
            ZoneKind::Enclosed => AmbientState {
                precipitation: 0.0,
                wind: 0.0,
                light: ambient.light,
                volume: ambient.volume * 0.5,
            },
            ZoneKind::Subterranean => AmbientState {
                precipitation: 0.0,
                wind: 0.0,
                light: 0.0,
                volume: ambient.volume * 0.2,
            },
        }
    }
}
