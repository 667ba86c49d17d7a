//! 几何内核
//!
//! 区域多边形的纯函数算法，无可变状态：
//! - 线段相交测试
//! - 点到线段距离
//! - 简单多边形校验（不自交 + 最小间距）
//! - 规范化（去重、包围盒、顶点重定位到局部原点）
//! - 点是否在多边形内

use crate::math::{cross, BoundingBox2, Point2, Vector2, EPSILON};
use serde::{Deserialize, Serialize};

/// 连续顶点视为重复的距离
pub const VERTEX_EPSILON: f64 = 0.5;

/// 区域多边形允许的顶点数范围
pub const MIN_VERTICES: usize = 3;
pub const MAX_VERTICES: usize = 64;

/// 多边形顶点
///
/// `permeable` 描述从本顶点到下一个顶点的那条边。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub permeable: bool,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            permeable: false,
        }
    }

    pub fn with_permeable(x: f64, y: f64, permeable: bool) -> Self {
        Self { x, y, permeable }
    }

    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            permeable: self.permeable,
        }
    }
}

/// 规范化结果
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// 相对于 (min_x, min_y) 的顶点
    pub vertices: Vec<Vertex>,
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

/// 线段相交测试（参数方程）
///
/// 平行或共线的线段一律视为不相交，即使它们重叠。
/// 端点接触（参数恰为 0 或 1）视为相交。
pub fn segments_intersect(p1: Point2, p2: Point2, q1: Point2, q2: Point2) -> bool {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = cross(&r, &s);
    if denom.abs() < EPSILON {
        return false;
    }

    let qp = q1 - p1;
    let t = cross(&qp, &s) / denom;
    let u = cross(&qp, &r) / denom;

    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// 点到线段的距离
pub fn point_to_segment_distance(point: Point2, a: Point2, b: Point2) -> f64 {
    let v: Vector2 = b - a;
    let len_sq = v.norm_squared();
    if len_sq < EPSILON {
        return (point - a).norm();
    }

    let t = ((point - a).dot(&v) / len_sq).clamp(0.0, 1.0);
    let projected = a + v * t;
    (point - projected).norm()
}

/// 简单多边形校验
///
/// 少于 3 个顶点永远无效；三角形直接通过。
/// 超过 3 个顶点时检查所有非相邻边对是否相交，
/// 再检查每个顶点到所有非关联边的距离不小于 `min_distance`。
pub fn is_simple_polygon(vertices: &[Vertex], min_distance: f64) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    if n == 3 {
        return true;
    }

    let edge = |i: usize| (vertices[i].point(), vertices[(i + 1) % n].point());

    for i in 0..n {
        let (a1, a2) = edge(i);
        for j in (i + 2)..n {
            // 首尾两条边共享顶点 0
            if i == 0 && j == n - 1 {
                continue;
            }
            let (b1, b2) = edge(j);
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }

    for (i, v) in vertices.iter().enumerate() {
        let p = v.point();
        for j in 0..n {
            if j == i || (j + 1) % n == i {
                continue;
            }
            let (b1, b2) = edge(j);
            if point_to_segment_distance(p, b1, b2) < min_distance {
                return false;
            }
        }
    }

    true
}

/// 去除连续重复顶点（距离不超过 [`VERTEX_EPSILON`]）
///
/// 被去掉的顶点把自己那条边的 `permeable` 交给保留下来的前一个顶点。
/// `keep_closing` 为 true 时保留首尾重合的一对（多点绘制进行中）。
pub fn dedup_vertices(vertices: &[Vertex], keep_closing: bool) -> Vec<Vertex> {
    let mut result: Vec<Vertex> = Vec::with_capacity(vertices.len());
    for v in vertices {
        match result.last_mut() {
            Some(last) if (last.point() - v.point()).norm() <= VERTEX_EPSILON => {
                last.permeable = v.permeable;
            }
            _ => result.push(*v),
        }
    }

    if !keep_closing && result.len() > 1 {
        let first = result[0].point();
        if let Some(last) = result.last() {
            if (last.point() - first).norm() <= VERTEX_EPSILON {
                result.pop();
            }
        }
    }

    result
}

/// 规范化：去重 → 包围盒 → 顶点重定位到包围盒原点
pub fn normalize(vertices: &[Vertex], keep_closing: bool) -> Normalized {
    let deduped = dedup_vertices(vertices, keep_closing);
    if deduped.is_empty() {
        return Normalized {
            vertices: deduped,
            min_x: 0.0,
            min_y: 0.0,
            width: 0.0,
            height: 0.0,
        };
    }

    let bbox = bounding_box(&deduped);
    let (min_x, min_y) = (bbox.min.x, bbox.min.y);

    Normalized {
        vertices: deduped
            .iter()
            .map(|v| v.translated(-min_x, -min_y))
            .collect(),
        min_x,
        min_y,
        width: bbox.width(),
        height: bbox.height(),
    }
}

pub fn bounding_box(vertices: &[Vertex]) -> BoundingBox2 {
    BoundingBox2::from_points(vertices.iter().map(Vertex::point))
}

/// 点是否在多边形内（奇偶射线法）
pub fn contains_point(vertices: &[Vertex], point: Point2) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (vertices[i], vertices[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// 点到多边形指定边集合的最短距离
///
/// `filter` 决定哪些边参与计算；没有边参与时返回 `None`。
pub fn distance_to_edges(
    vertices: &[Vertex],
    point: Point2,
    filter: impl Fn(&Vertex) -> bool,
) -> Option<f64> {
    let n = vertices.len();
    (0..n)
        .filter(|&i| filter(&vertices[i]))
        .map(|i| {
            point_to_segment_distance(point, vertices[i].point(), vertices[(i + 1) % n].point())
        })
        .min_by(|a, b| a.total_cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(points: &[(f64, f64)]) -> Vec<Vertex> {
        points.iter().map(|&(x, y)| Vertex::new(x, y)).collect()
    }

    #[test]
    fn test_crossing_diagonals_intersect() {
        assert!(segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 0.0),
        ));
    }

    #[test]
    fn test_parallel_segments_do_not_intersect() {
        assert!(!segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 5.0),
            Point2::new(10.0, 5.0),
        ));
    }

    #[test]
    fn test_collinear_overlap_is_not_reported() {
        // 已知边界：共线重叠的线段不算相交
        assert!(!segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(15.0, 0.0),
        ));
    }

    #[test]
    fn test_disjoint_segments() {
        assert!(!segments_intersect(
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(5.0, 0.0),
            Point2::new(6.0, -3.0),
        ));
    }

    #[test]
    fn test_point_to_segment_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);
        assert!((point_to_segment_distance(Point2::new(5.0, 3.0), a, b) - 3.0).abs() < EPSILON);
        // 投影落在线段外，夹到端点
        assert!((point_to_segment_distance(Point2::new(13.0, 4.0), a, b) - 5.0).abs() < EPSILON);
        // 退化线段
        assert!((point_to_segment_distance(Point2::new(3.0, 4.0), a, a) - 5.0).abs() < EPSILON);
    }

    #[test]
    fn test_simple_polygon() {
        let square = poly(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        assert!(is_simple_polygon(&square, 1.0));

        let bowtie = poly(&[(0.0, 0.0), (100.0, 100.0), (100.0, 0.0), (0.0, 100.0)]);
        assert!(!is_simple_polygon(&bowtie, 1.0));

        assert!(!is_simple_polygon(&poly(&[(0.0, 0.0), (1.0, 1.0)]), 1.0));
    }

    #[test]
    fn test_triangle_skips_distance_check() {
        let flat = poly(&[(0.0, 0.0), (100.0, 0.0), (50.0, 5.0)]);
        assert!(is_simple_polygon(&flat, 10.0));
    }

    #[test]
    fn test_min_distance_pinch() {
        // 凹口顶点离底边只有 2
        let pinched = poly(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 100.0),
            (50.0, 2.0),
            (0.0, 100.0),
        ]);
        assert!(is_simple_polygon(&pinched, 1.0));
        assert!(!is_simple_polygon(&pinched, 5.0));
    }

    #[test]
    fn test_normalize_rebases_and_dedups() {
        let mut vertices = poly(&[
            (10.0, 20.0),
            (10.0, 20.0),
            (110.0, 20.0),
            (60.0, 70.0),
            (10.0, 20.0),
        ]);
        vertices[1].permeable = true;
        let n = normalize(&vertices, false);
        assert_eq!(n.vertices.len(), 3);
        assert!(n.vertices[0].permeable);
        assert_eq!((n.min_x, n.min_y), (10.0, 20.0));
        assert_eq!((n.width, n.height), (100.0, 50.0));
        assert_eq!(n.vertices[0].point(), Point2::new(0.0, 0.0));
        assert_eq!(n.vertices[2].point(), Point2::new(50.0, 50.0));
    }

    #[test]
    fn test_normalize_keeps_closing_pair_while_drafting() {
        let vertices = poly(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]);
        assert_eq!(normalize(&vertices, true).vertices.len(), 4);
        assert_eq!(normalize(&vertices, false).vertices.len(), 3);
    }

    #[test]
    fn test_normalize_idempotent() {
        let vertices = poly(&[(-5.0, 3.0), (40.0, -7.5), (42.0, 42.0), (42.0, 42.2), (-1.0, 30.0)]);
        let once = normalize(&vertices, false);
        let twice = normalize(&once.vertices, false);
        assert_eq!(once.vertices, twice.vertices);
        assert_eq!((once.width, once.height), (twice.width, twice.height));
        assert_eq!((twice.min_x, twice.min_y), (0.0, 0.0));
    }

    #[test]
    fn test_contains_point() {
        let l_shape = poly(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 40.0),
            (40.0, 40.0),
            (40.0, 100.0),
            (0.0, 100.0),
        ]);
        assert!(contains_point(&l_shape, Point2::new(20.0, 80.0)));
        assert!(contains_point(&l_shape, Point2::new(80.0, 20.0)));
        assert!(!contains_point(&l_shape, Point2::new(80.0, 80.0)));
        assert!(!contains_point(&l_shape, Point2::new(-1.0, 5.0)));
    }

    #[test]
    fn test_distance_to_edges_filter() {
        let mut square = poly(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        let center = Point2::new(50.0, 20.0);
        assert!(distance_to_edges(&square, center, |v| v.permeable).is_none());
        square[1].permeable = true; // 右边
        let d = distance_to_edges(&square, center, |v| v.permeable).unwrap();
        assert!((d - 50.0).abs() < EPSILON);
    }
}
