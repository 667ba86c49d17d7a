//! Zonal 核心：场景区域的几何与编辑
//!
//! 区域是场景中的一个简单多边形，带有类型（露天、有顶、封闭、地下），
//! 用来局部改写天气、光照和环境音。
//!
//! # 架构设计
//!
//! - `geometry`: 纯函数几何内核（相交、距离、简单性、规范化）
//! - `zone`: 区域记录，所有修改都保持多边形不变量
//! - `manager`: 每个场景一个管理器，负责增删改、撤销、查询和持久化
//! - `edit`: 拖拽与多点绘制状态机
//!
//! # 示例
//!
//! ```rust
//! use zonal_core::prelude::*;
//!
//! let zone = ZoneRecord::from_points(&[(0.0, 0.0), (100.0, 0.0), (50.0, 80.0)]);
//! assert!(zone.validate(10.0).is_ok());
//! assert!(zone.contains(Point2::new(50.0, 20.0)));
//! ```

pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod geometry;
pub mod history;
pub mod kind;
pub mod manager;
pub mod math;
pub mod persistence;
pub mod schema;
pub mod spatial;
pub mod zone;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::config::ManagerConfig;
    pub use crate::edit::{EditGesture, EditOutcome, EditPhase, EditTarget, FrameHandle, Modifiers};
    pub use crate::error::{StoreError, ZoneError};
    pub use crate::events::{EventBus, NoticeLevel, ZoneEvent};
    pub use crate::geometry::Vertex;
    pub use crate::history::{History, HistoryEntry};
    pub use crate::kind::{AmbientFilter, AmbientState, KindAttributes, ProfileFilter, ZoneKind};
    pub use crate::manager::{CreateOptions, DeleteOptions, UndoOutcome, UpdateOptions, ZoneManager};
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::persistence::{MemoryStore, ZoneStore};
    pub use crate::schema::{FieldType, FieldValue, ZonePatch};
    pub use crate::zone::{Frame, SceneId, ZoneId, ZoneRecord};
}
