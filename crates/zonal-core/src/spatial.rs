//! 空间索引
//!
//! 基于均匀网格的区域外框索引，支持：
//! - 范围查询（框选）
//! - 点击测试（候选集，精确判定由调用方完成）
//!
//! 覆盖单元过多的区域不登记到网格，单独放在 `oversized` 里，每次查询都检查；
//! 覆盖单元数超过已索引区域数的查询矩形直接线性扫描外框缓存。

use crate::math::{BoundingBox2, Point2};
use crate::zone::ZoneId;
use std::collections::{HashMap, HashSet};

/// 单个区域最多登记的网格单元数
const MAX_CELLS_PER_ZONE: u64 = 256;

/// 网格索引
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// 网格单元大小
    cell_size: f64,

    /// 网格坐标 -> 区域列表
    grid: HashMap<(i64, i64), Vec<ZoneId>>,

    /// 不登记到网格的大区域
    oversized: HashSet<ZoneId>,

    /// 区域外框缓存
    bboxes: HashMap<ZoneId, BoundingBox2>,
}

impl SpatialIndex {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            grid: HashMap::new(),
            oversized: HashSet::new(),
            bboxes: HashMap::new(),
        }
    }

    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    /// 外框覆盖的单元数（饱和计算）
    fn cell_count(&self, bbox: &BoundingBox2) -> u64 {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min.x, bbox.min.y);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max.x, bbox.max.y);
        let span = |lo: i64, hi: i64| {
            (hi as i128 - lo as i128 + 1).clamp(0, u64::MAX as i128) as u64
        };
        span(min_gx, max_gx).saturating_mul(span(min_gy, max_gy))
    }

    fn cells_for_bbox(&self, bbox: &BoundingBox2) -> impl Iterator<Item = (i64, i64)> {
        let (min_gx, min_gy) = self.to_grid_coord(bbox.min.x, bbox.min.y);
        let (max_gx, max_gy) = self.to_grid_coord(bbox.max.x, bbox.max.y);
        (min_gx..=max_gx).flat_map(move |gx| (min_gy..=max_gy).map(move |gy| (gx, gy)))
    }

    /// 插入或更新区域外框
    pub fn insert(&mut self, id: ZoneId, bbox: BoundingBox2) {
        self.remove(&id);

        if self.cell_count(&bbox) > MAX_CELLS_PER_ZONE {
            self.oversized.insert(id);
        } else {
            let cells: Vec<_> = self.cells_for_bbox(&bbox).collect();
            for cell in cells {
                self.grid.entry(cell).or_default().push(id);
            }
        }
        self.bboxes.insert(id, bbox);
    }

    pub fn remove(&mut self, id: &ZoneId) -> bool {
        let Some(bbox) = self.bboxes.remove(id) else {
            return false;
        };
        if self.oversized.remove(id) {
            return true;
        }
        let cells: Vec<_> = self.cells_for_bbox(&bbox).collect();
        for cell in cells {
            if let Some(ids) = self.grid.get_mut(&cell) {
                ids.retain(|e| e != id);
                if ids.is_empty() {
                    self.grid.remove(&cell);
                }
            }
        }
        true
    }

    /// 外框与矩形相交的区域
    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<ZoneId> {
        if self.cell_count(rect) > self.bboxes.len() as u64 {
            return self
                .bboxes
                .iter()
                .filter(|(_, b)| b.intersects(rect))
                .map(|(id, _)| *id)
                .collect();
        }

        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let cell_hits = self.cells_for_bbox(rect).filter_map(|cell| self.grid.get(&cell)).flatten();
        for id in cell_hits.chain(self.oversized.iter()) {
            if seen.insert(*id) && self.bboxes.get(id).is_some_and(|b| b.intersects(rect)) {
                result.push(*id);
            }
        }
        result
    }

    /// 外框包含该点的区域
    pub fn query_point(&self, point: &Point2) -> Vec<ZoneId> {
        let cell = self.to_grid_coord(point.x, point.y);
        self.grid
            .get(&cell)
            .into_iter()
            .flatten()
            .chain(self.oversized.iter())
            .filter(|id| self.bboxes.get(*id).is_some_and(|b| b.contains(point)))
            .copied()
            .collect()
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.oversized.clear();
        self.bboxes.clear();
    }

    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }
}
