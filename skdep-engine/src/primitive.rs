use std::f64::consts::TAU;

use glam::{DAffine3, DVec3};
use skdep_core::color::{Rgb, color_for_dependencies};
use skdep_core::geometry::{Bounds3, Point2};
use skdep_core::model::{EntityId, GeometryKind, SketchEntity, SketchGeometry};
use tracing::{debug, trace};

/// 被过滤实体的绘制顺序。
pub const DRAW_ORDER_DIMMED: i32 = 1;
pub const DRAW_ORDER_LINE: i32 = 1;
pub const DRAW_ORDER_POINT: i32 = 2;
/// 激活集合中的实体绘制在灰色实体之上。
pub const DRAW_ORDER_ELEVATED: i32 = 5;
pub const DRAW_ORDER_OVERLAY: i32 = 999;

const LINE_COLOR: Rgb = Rgb::from_hex(0xFF0000);
const CIRCLE_COLOR: Rgb = Rgb::from_hex(0x0000FF);
const SPLINE_COLOR: Rgb = Rgb::from_hex(0x00AA00);
const POINT_COLOR: Rgb = Rgb::from_hex(0x333333);

/// 图元的显式类别，创建时确定，后续逻辑只依据该标签分支。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Point,
    Polyline,
    ClosedPolyline,
}

impl PrimitiveKind {
    #[inline]
    pub fn is_polyline(self) -> bool {
        matches!(self, PrimitiveKind::Polyline | PrimitiveKind::ClosedPolyline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(usize);

impl PrimitiveId {
    #[inline]
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

/// 高亮引擎拥有的瞬时绘制属性。`base_color` 烘焙后不再改变。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintState {
    default_color: Rgb,
    base_color: Option<Rgb>,
    current_color: Rgb,
    opacity: f32,
    draw_order: i32,
}

impl PaintState {
    fn new(default_color: Rgb, draw_order: i32) -> Self {
        Self {
            default_color,
            base_color: None,
            current_color: default_color,
            opacity: 1.0,
            draw_order,
        }
    }

    /// 烘焙色；尚未烘焙时为按几何类别给出的默认色。
    #[inline]
    pub fn base_color(&self) -> Rgb {
        self.base_color.unwrap_or(self.default_color)
    }

    #[inline]
    pub fn is_baked(&self) -> bool {
        self.base_color.is_some()
    }

    #[inline]
    pub fn current_color(&self) -> Rgb {
        self.current_color
    }

    #[inline]
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    #[inline]
    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }
}

/// 拾取子系统拥有的尺寸属性（线宽或点半径）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeState {
    current: f64,
    original: Option<f64>,
}

impl SizeState {
    fn new(size: f64) -> Self {
        Self {
            current: size,
            original: None,
        }
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// 未受悬停或选中放大影响的尺寸。
    #[inline]
    pub fn base(&self) -> f64 {
        self.original.unwrap_or(self.current)
    }

    /// 首次被拾取触碰时缓存的原始尺寸。
    #[inline]
    pub fn cached_original(&self) -> Option<f64> {
        self.original
    }

    /// 相对原始尺寸设置倍率，永远不会在已放大的值上叠加。
    pub(crate) fn apply_multiplier(&mut self, multiplier: f64) {
        let original = *self.original.get_or_insert(self.current);
        self.current = original * multiplier;
    }

    pub(crate) fn restore(&mut self) {
        if let Some(original) = self.original {
            self.current = original;
        }
    }

    #[inline]
    pub fn multiplier(&self) -> f64 {
        match self.original {
            Some(original) if original > 0.0 => self.current / original,
            _ => 1.0,
        }
    }
}

/// 渲染协作方生成的可绘制图元。
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    entity: EntityId,
    kind: PrimitiveKind,
    geometry_kind: GeometryKind,
    is_construction: bool,
    dependency_count: u32,
    vertices: Vec<DVec3>,
    transform: DAffine3,
    base_draw_order: i32,
    paint: PaintState,
    size: SizeState,
}

impl Primitive {
    #[inline]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    #[inline]
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    #[inline]
    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry_kind
    }

    #[inline]
    pub fn is_construction(&self) -> bool {
        self.is_construction
    }

    #[inline]
    pub fn dependency_count(&self) -> u32 {
        self.dependency_count
    }

    /// 局部坐标顶点，世界坐标需经过 `transform`。
    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    #[inline]
    pub fn transform(&self) -> DAffine3 {
        self.transform
    }

    pub fn world_vertices(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.vertices
            .iter()
            .map(|vertex| self.transform.transform_point3(*vertex))
    }

    /// 折线的世界坐标线段；闭合折线包含首尾相连的一段。
    pub fn world_segments(&self) -> Vec<(DVec3, DVec3)> {
        let points: Vec<DVec3> = self.world_vertices().collect();
        let mut segments: Vec<(DVec3, DVec3)> =
            points.windows(2).map(|pair| (pair[0], pair[1])).collect();
        if self.kind == PrimitiveKind::ClosedPolyline && points.len() > 2 {
            if let (Some(last), Some(first)) = (points.last(), points.first()) {
                segments.push((*last, *first));
            }
        }
        segments
    }

    #[inline]
    pub fn base_draw_order(&self) -> i32 {
        self.base_draw_order
    }

    #[inline]
    pub fn paint(&self) -> &PaintState {
        &self.paint
    }

    #[inline]
    pub fn size(&self) -> &SizeState {
        &self.size
    }

    pub(crate) fn set_paint(&mut self, color: Rgb, opacity: f32, draw_order: i32) {
        self.paint.current_color = color;
        self.paint.opacity = opacity;
        self.paint.draw_order = draw_order;
    }

    pub(crate) fn size_mut(&mut self) -> &mut SizeState {
        &mut self.size
    }
}

/// 细分参数。坐标单位为英寸，乘以 `scale` 后进入世界坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationOptions {
    pub scale: f64,
    pub top_plane_offset: f64,
    pub line_width: f64,
    /// 点标记半径占包围盒对角线的比例。
    pub point_radius_ratio: f64,
    pub min_point_radius: f64,
    pub full_circle_segments: usize,
    pub arc_segments: usize,
    pub bezier_segments: usize,
    pub spline_min_samples: usize,
    pub spline_samples_per_point: usize,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            scale: 1000.0,
            top_plane_offset: 0.0001,
            line_width: 2.0,
            point_radius_ratio: 0.001,
            min_point_radius: 0.03,
            full_circle_segments: 128,
            arc_segments: 96,
            bezier_segments: 64,
            spline_min_samples: 96,
            spline_samples_per_point: 12,
        }
    }
}

/// 图元树：每个可绘制实体对应一个图元，加载后几何不可变。
#[derive(Debug, Clone, Default)]
pub struct RenderGroup {
    primitives: Vec<Primitive>,
}

impl RenderGroup {
    pub fn from_entities(entities: &[SketchEntity], options: &TessellationOptions) -> Self {
        let mut primitives: Vec<Primitive> = entities
            .iter()
            .filter_map(|entity| tessellate(entity, options))
            .collect();

        let mut bounds = Bounds3::empty();
        for primitive in primitives.iter().filter(|p| p.kind.is_polyline()) {
            for vertex in primitive.world_vertices() {
                bounds.include_point(vertex);
            }
        }
        let radius = (bounds.diagonal() * options.point_radius_ratio).max(options.min_point_radius);
        for primitive in primitives.iter_mut().filter(|p| p.kind == PrimitiveKind::Point) {
            primitive.size = SizeState::new(radius);
        }

        debug!(
            entities = entities.len(),
            primitives = primitives.len(),
            point_radius = radius,
            "图元树已生成"
        );
        Self { primitives }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    #[inline]
    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.primitives.get_mut(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveId, &Primitive)> {
        self.primitives
            .iter()
            .enumerate()
            .map(|(index, primitive)| (PrimitiveId(index), primitive))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Primitive> {
        self.primitives.iter_mut()
    }

    pub fn find_by_entity(&self, entity: &str) -> Option<PrimitiveId> {
        self.primitives
            .iter()
            .position(|primitive| primitive.entity.as_str() == entity)
            .map(PrimitiveId)
    }

    pub fn bounds(&self) -> Bounds3 {
        let mut bounds = Bounds3::empty();
        for primitive in &self.primitives {
            for vertex in primitive.world_vertices() {
                bounds.include_point(vertex);
            }
        }
        bounds
    }

    /// 按全局依赖范围烘焙基础色，每次加载只生效一次。
    pub fn bake_base_colors(&mut self, global_min: u32, global_max: u32) -> usize {
        let mut baked = 0;
        for primitive in &mut self.primitives {
            if primitive.paint.base_color.is_some() {
                continue;
            }
            let color = color_for_dependencies(
                f64::from(primitive.dependency_count),
                f64::from(global_min),
                f64::from(global_max),
            );
            primitive.paint.base_color = Some(color);
            primitive.paint.current_color = color;
            baked += 1;
        }
        debug!(baked, global_min, global_max, "基础色已烘焙");
        baked
    }
}

fn tessellate(entity: &SketchEntity, options: &TessellationOptions) -> Option<Primitive> {
    let scale = options.scale;
    let plane = entity.plane;
    let map = |local: Point2| plane.to_world(local.as_vec2() * scale, options.top_plane_offset);

    let (kind, vertices, transform, color) = match &entity.geometry {
        SketchGeometry::Point { position } => (
            PrimitiveKind::Point,
            vec![DVec3::ZERO],
            DAffine3::from_translation(map(*position)),
            POINT_COLOR,
        ),
        SketchGeometry::Line { origin, direction } => {
            let direction = direction.normalize_or_zero();
            let t0 = entity.start_param.unwrap_or(0.0) * scale;
            let t1 = entity.end_param.unwrap_or(0.0) * scale;
            let start = origin.as_vec2() * scale + direction * t0;
            let end = origin.as_vec2() * scale + direction * t1;
            let color = if entity.is_construction { POINT_COLOR } else { LINE_COLOR };
            (
                PrimitiveKind::Polyline,
                vec![
                    plane.to_world(start, options.top_plane_offset),
                    plane.to_world(end, options.top_plane_offset),
                ],
                DAffine3::IDENTITY,
                color,
            )
        }
        SketchGeometry::Circle {
            center,
            radius,
            clockwise,
        } => {
            let a0 = entity.start_param.unwrap_or(0.0);
            let a1 = entity.end_param.unwrap_or(TAU);
            let full = (a1 - a0).abs() >= TAU - 1e-6;
            let segments = if full {
                options.full_circle_segments
            } else {
                options.arc_segments
            };
            let mut points = arc_points(
                Point2::from(center.as_vec2() * scale),
                radius * scale,
                a0,
                a1,
                *clockwise,
                segments,
            );
            let kind = if full {
                // 闭合折线隐式连接首尾，去掉重复的终点。
                points.pop();
                PrimitiveKind::ClosedPolyline
            } else {
                PrimitiveKind::Polyline
            };
            let vertices = points
                .into_iter()
                .map(|p| plane.to_world(p.as_vec2(), options.top_plane_offset))
                .collect();
            (kind, vertices, DAffine3::IDENTITY, CIRCLE_COLOR)
        }
        SketchGeometry::Spline { points, handles } => {
            if points.len() < 2 {
                trace!(entity = %entity.id, "样条点数不足，跳过");
                return None;
            }
            let world: Vec<DVec3> = points.iter().map(|p| map(*p)).collect();
            let vertices = match handles {
                Some((start_handle, end_handle)) if world.len() == 2 => cubic_bezier(
                    world[0],
                    map(*start_handle),
                    map(*end_handle),
                    world[1],
                    options.bezier_segments,
                ),
                _ => {
                    let samples = options
                        .spline_min_samples
                        .max(world.len() * options.spline_samples_per_point);
                    centripetal_catmull_rom(&world, samples)
                }
            };
            (PrimitiveKind::Polyline, vertices, DAffine3::IDENTITY, SPLINE_COLOR)
        }
    };

    let base_draw_order = match kind {
        PrimitiveKind::Point => DRAW_ORDER_POINT,
        _ => DRAW_ORDER_LINE,
    };

    Some(Primitive {
        entity: entity.id.clone(),
        kind,
        geometry_kind: entity.geometry_kind(),
        is_construction: entity.is_construction,
        dependency_count: entity.dependency_count(),
        vertices,
        transform,
        base_draw_order,
        paint: PaintState::new(color, base_draw_order),
        size: SizeState::new(options.line_width),
    })
}

/// 圆弧采样，返回 `divisions + 1` 个点；`clockwise` 时沿顺时针方向从起始角走到终止角。
fn arc_points(
    center: Point2,
    radius: f64,
    start: f64,
    end: f64,
    clockwise: bool,
    divisions: usize,
) -> Vec<Point2> {
    let same_points = (end - start).abs() < f64::EPSILON;
    let mut delta = (end - start).rem_euclid(TAU);
    if delta < f64::EPSILON {
        delta = if same_points { 0.0 } else { TAU };
    }
    if clockwise && !same_points {
        delta = if delta == TAU { -TAU } else { delta - TAU };
    }

    let divisions = divisions.max(1);
    (0..=divisions)
        .map(|step| {
            let angle = start + delta * (step as f64 / divisions as f64);
            Point2::new(
                center.x() + radius * angle.cos(),
                center.y() + radius * angle.sin(),
            )
        })
        .collect()
}

fn cubic_bezier(p0: DVec3, p1: DVec3, p2: DVec3, p3: DVec3, divisions: usize) -> Vec<DVec3> {
    let divisions = divisions.max(1);
    (0..=divisions)
        .map(|step| {
            let t = step as f64 / divisions as f64;
            let k = 1.0 - t;
            p0 * (k * k * k) + p1 * (3.0 * k * k * t) + p2 * (3.0 * k * t * t) + p3 * (t * t * t)
        })
        .collect()
}

/// 向心 Catmull–Rom（非闭合），端点外插虚拟控制点。
fn centripetal_catmull_rom(points: &[DVec3], divisions: usize) -> Vec<DVec3> {
    let count = points.len();
    let divisions = divisions.max(1);
    (0..=divisions)
        .map(|step| {
            let t = step as f64 / divisions as f64;
            let p = (count - 1) as f64 * t;
            let mut segment = p.floor() as usize;
            let mut weight = p - segment as f64;
            if segment >= count - 1 {
                segment = count - 2;
                weight = 1.0;
            }

            let p1 = points[segment];
            let p2 = points[segment + 1];
            let p0 = if segment > 0 {
                points[segment - 1]
            } else {
                points[0] * 2.0 - points[1]
            };
            let p3 = if segment + 2 < count {
                points[segment + 2]
            } else {
                points[count - 1] * 2.0 - points[count - 2]
            };

            let mut dt1 = p1.distance_squared(p2).powf(0.25);
            let mut dt0 = p0.distance_squared(p1).powf(0.25);
            let mut dt2 = p2.distance_squared(p3).powf(0.25);
            if dt1 < 1e-4 {
                dt1 = 1.0;
            }
            if dt0 < 1e-4 {
                dt0 = dt1;
            }
            if dt2 < 1e-4 {
                dt2 = dt1;
            }

            let t1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
            let t2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

            let c0 = p1;
            let c1 = t1;
            let c2 = p1 * -3.0 + p2 * 3.0 - t1 * 2.0 - t2;
            let c3 = p1 * 2.0 - p2 * 2.0 + t1 + t2;
            c0 + c1 * weight + c2 * (weight * weight) + c3 * (weight * weight * weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use skdep_core::model::DependencyEdge;

    fn edge() -> DependencyEdge {
        DependencyEdge::new("d", "w", "e", "f")
    }

    #[test]
    fn line_is_trimmed_by_params_and_scaled() {
        let entity = SketchEntity::new(
            "L",
            SketchGeometry::Line {
                origin: Point2::new(0.0, 0.0),
                direction: DVec2::new(2.0, 0.0),
            },
        )
        .with_params(-0.5, 0.5);
        let group = RenderGroup::from_entities(&[entity], &TessellationOptions::default());
        let primitive = group.get(PrimitiveId::new(0)).expect("应生成直线图元");
        assert_eq!(primitive.kind(), PrimitiveKind::Polyline);
        let vertices: Vec<DVec3> = primitive.world_vertices().collect();
        assert!((vertices[0].x + 500.0).abs() < 1e-9);
        assert!((vertices[1].x - 500.0).abs() < 1e-9);
        assert!((vertices[0].z - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn full_circle_is_closed_and_arc_is_open() {
        let circle = SketchEntity::new(
            "C",
            SketchGeometry::Circle {
                center: Point2::new(0.0, 0.0),
                radius: 1.0,
                clockwise: false,
            },
        );
        let arc = SketchEntity::new(
            "A",
            SketchGeometry::Circle {
                center: Point2::new(0.0, 0.0),
                radius: 1.0,
                clockwise: false,
            },
        )
        .with_params(0.0, std::f64::consts::FRAC_PI_2);
        let group = RenderGroup::from_entities(&[circle, arc], &TessellationOptions::default());

        let full = group.get(PrimitiveId::new(0)).expect("应生成整圆");
        assert_eq!(full.kind(), PrimitiveKind::ClosedPolyline);
        assert_eq!(full.vertices().len(), 128);
        assert_eq!(full.world_segments().len(), 128);

        let open = group.get(PrimitiveId::new(1)).expect("应生成圆弧");
        assert_eq!(open.kind(), PrimitiveKind::Polyline);
        assert_eq!(open.vertices().len(), 97);
        let last = open.vertices()[96];
        assert!(last.x.abs() < 1e-6 && (last.y - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn clockwise_arc_goes_the_long_way() {
        let points = arc_points(Point2::new(0.0, 0.0), 1.0, 0.0, std::f64::consts::FRAC_PI_2, true, 4);
        // 顺时针从 0 走到 π/2 经过 -π/2 附近
        assert!(points[2].y() < 0.0);
        let end = points[4];
        assert!(end.x().abs() < 1e-9 && (end.y() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn splines_interpolate_endpoints() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
        ];
        let sampled = centripetal_catmull_rom(&points, 96);
        assert_eq!(sampled.len(), 97);
        assert!(sampled[0].distance(points[0]) < 1e-9);
        assert!(sampled[48].distance(points[1]) < 1e-9);
        assert!(sampled[96].distance(points[2]) < 1e-9);

        let short = SketchEntity::new(
            "S",
            SketchGeometry::Spline {
                points: vec![Point2::new(0.0, 0.0)],
                handles: None,
            },
        );
        assert!(RenderGroup::from_entities(&[short], &TessellationOptions::default()).is_empty());
    }

    #[test]
    fn baking_happens_once() {
        let low = SketchEntity::new("low", SketchGeometry::Point { position: Point2::new(0.0, 0.0) });
        let high = SketchEntity::new("high", SketchGeometry::Point { position: Point2::new(1.0, 0.0) })
            .with_edges([edge(), edge()]);
        let mut group = RenderGroup::from_entities(&[low, high], &TessellationOptions::default());
        assert_eq!(group.bake_base_colors(0, 2), 2);
        let before: Vec<Rgb> = group.iter().map(|(_, p)| p.paint().base_color()).collect();
        assert_eq!(group.bake_base_colors(0, 100), 0);
        let after: Vec<Rgb> = group.iter().map(|(_, p)| p.paint().base_color()).collect();
        assert_eq!(before, after);
        assert_eq!(before[1], Rgb::new(235, 0, 0));
    }

    #[test]
    fn size_multiplier_never_compounds() {
        let mut size = SizeState::new(2.0);
        size.apply_multiplier(2.0);
        size.apply_multiplier(3.0);
        assert!((size.current() - 6.0).abs() < 1e-12);
        size.restore();
        assert!((size.current() - 2.0).abs() < 1e-12);
        assert_eq!(size.cached_original(), Some(2.0));
    }
}
