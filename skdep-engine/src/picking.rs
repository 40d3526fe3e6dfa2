use glam::{DMat4, DVec2, DVec3, DVec4};
use skdep_core::geometry::{Plane, Ray};
use tracing::trace;

use crate::primitive::{PrimitiveId, PrimitiveKind, RenderGroup};

const TIE_EPSILON: f64 = 1e-9;

/// 透视相机快照，拾取只读取它，不负责相机导航。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    /// 垂直视场角（度）。
    pub fov_y_degrees: f64,
    pub viewport: DVec2,
    pub near: f64,
    pub far: f64,
}

impl Camera {
    pub fn looking_at(position: DVec3, target: DVec3) -> Self {
        Self {
            position,
            target,
            up: DVec3::Z,
            fov_y_degrees: 50.0,
            viewport: DVec2::new(1280.0, 720.0),
            near: 0.1,
            far: 1.0e7,
        }
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = DVec2::new(width.max(1.0), height.max(1.0));
        self
    }

    pub fn with_up(mut self, up: DVec3) -> Self {
        self.up = up;
        self
    }

    #[inline]
    pub fn forward(&self) -> DVec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// 视线与 `up` 平行时换一个参考上方向，避免 look-at 退化。
    fn effective_up(&self) -> DVec3 {
        let forward = self.forward();
        if forward.cross(self.up).length_squared() < 1e-12 {
            if forward.cross(DVec3::Y).length_squared() < 1e-12 {
                DVec3::X
            } else {
                DVec3::Y
            }
        } else {
            self.up
        }
    }

    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.effective_up())
    }

    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.viewport.x / self.viewport.y,
            self.near,
            self.far,
        )
    }

    /// 屏幕坐标（像素，原点在左上角）转世界射线。
    pub fn screen_to_ray(&self, screen: DVec2) -> Ray {
        let ndc_x = 2.0 * screen.x / self.viewport.x - 1.0;
        let ndc_y = 1.0 - 2.0 * screen.y / self.viewport.y;

        let inv_proj = self.projection_matrix().inverse();
        let inv_view = self.view_matrix().inverse();

        // perspective_rh 的深度范围为 [0, 1]
        let near_view = inv_proj * DVec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far_view = inv_proj * DVec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near_view = near_view.truncate() / near_view.w;
        let far_view = far_view.truncate() / far_view.w;

        let near_world = (inv_view * near_view.extend(1.0)).truncate();
        let far_world = (inv_view * far_view.extend(1.0)).truncate();
        Ray::new(near_world, far_world - near_world)
    }

    /// 世界坐标投影到屏幕像素；位于相机后方时返回 `None`。
    pub fn project(&self, world: DVec3) -> Option<DVec2> {
        let clip = self.projection_matrix() * self.view_matrix() * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(DVec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }

    /// 相机到参考平面的距离：沿视线求交，视线不与平面相交时取垂直距离。
    pub fn distance_to_plane(&self, plane: &Plane) -> f64 {
        Ray::new(self.position, self.forward())
            .distance_to_plane(plane)
            .unwrap_or_else(|| plane.signed_distance(self.position).abs())
    }

    /// 给定距离处每个屏幕像素对应的世界长度。
    pub fn world_units_per_pixel(&self, distance: f64) -> f64 {
        let visible_height = 2.0 * (self.fov_y_degrees.to_radians() / 2.0).tan() * distance;
        visible_height / self.viewport.y
    }
}

/// 指针交互类型，悬停比点击使用更宽松的像素预算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickIntent {
    Hover,
    Click,
}

/// 与设备像素无关的命中容差参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceModel {
    pub hover_pixels: f64,
    pub click_pixels: f64,
    pub pixel_scale: f64,
    pub min_scaled_pixels: f64,
    pub min_line_tolerance: f64,
    pub point_pixels: f64,
    pub point_boost: f64,
    pub min_point_tolerance: f64,
}

impl Default for ToleranceModel {
    fn default() -> Self {
        Self {
            hover_pixels: 8.0,
            click_pixels: 6.0,
            pixel_scale: 1.0,
            min_scaled_pixels: 0.2,
            min_line_tolerance: 0.05,
            point_pixels: 7.0,
            point_boost: 10.0,
            min_point_tolerance: 2.0,
        }
    }
}

impl ToleranceModel {
    #[inline]
    pub fn pixel_budget(&self, intent: PickIntent) -> f64 {
        match intent {
            PickIntent::Hover => self.hover_pixels,
            PickIntent::Click => self.click_pixels,
        }
    }

    /// `max(wpp × max(pixels × scale × zoom, 下限), 最小容差)`。
    pub fn line_tolerance(&self, pixels: f64, zoom_factor: f64, world_per_pixel: f64) -> f64 {
        let scaled = (pixels * self.pixel_scale * zoom_factor).max(self.min_scaled_pixels);
        (world_per_pixel * scaled).max(self.min_line_tolerance)
    }

    pub fn point_tolerance(&self, world_per_pixel: f64) -> f64 {
        (world_per_pixel * self.point_pixels * self.point_boost).max(self.min_point_tolerance)
    }
}

/// 命中结果。`distance` 为射线到图元的垂直距离，`depth` 为沿射线的距离。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub primitive: PrimitiveId,
    pub distance: f64,
    pub depth: f64,
    pub via_fallback: bool,
}

impl PickHit {
    fn closer_than(&self, other: &PickHit) -> bool {
        if (self.distance - other.distance).abs() > TIE_EPSILON {
            self.distance < other.distance
        } else {
            self.depth < other.depth
        }
    }
}

/// 空间查询：先查通用命中，再对点标记做线性回退扫描。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Picker {
    tolerance: ToleranceModel,
    reference: Plane,
    baseline_distance: f64,
}

impl Picker {
    /// 记录当前相机到参考平面的距离作为缩放基线（为 0 时取 1）。
    pub fn new(tolerance: ToleranceModel, reference: Plane, camera: &Camera) -> Self {
        let distance = camera.distance_to_plane(&reference);
        let baseline_distance = if distance > 0.0 && distance.is_finite() {
            distance
        } else {
            1.0
        };
        Self {
            tolerance,
            reference,
            baseline_distance,
        }
    }

    #[inline]
    pub fn tolerance(&self) -> &ToleranceModel {
        &self.tolerance
    }

    #[inline]
    pub fn baseline_distance(&self) -> f64 {
        self.baseline_distance
    }

    pub fn line_tolerance(&self, camera: &Camera, intent: PickIntent) -> f64 {
        let distance = camera.distance_to_plane(&self.reference);
        let zoom = distance / self.baseline_distance;
        self.tolerance.line_tolerance(
            self.tolerance.pixel_budget(intent),
            zoom,
            camera.world_units_per_pixel(distance),
        )
    }

    pub fn point_tolerance(&self, camera: &Camera) -> f64 {
        let distance = camera.distance_to_plane(&self.reference);
        self.tolerance
            .point_tolerance(camera.world_units_per_pixel(distance))
    }

    /// 解析屏幕坐标到唯一候选图元；两类查询都落空即为空白区域。
    pub fn pick(
        &self,
        group: &RenderGroup,
        camera: &Camera,
        screen: DVec2,
        intent: PickIntent,
    ) -> Option<PickHit> {
        let ray = camera.screen_to_ray(screen);
        let line_tolerance = self.line_tolerance(camera, intent);

        let hit = general_query(group, &ray, line_tolerance).or_else(|| {
            nearest_point_marker(group, &ray, self.point_tolerance(camera))
        });
        trace!(
            ?intent,
            x = screen.x,
            y = screen.y,
            line_tolerance,
            hit = ?hit.map(|h| h.primitive),
            "拾取查询"
        );
        hit
    }
}

fn general_query(group: &RenderGroup, ray: &Ray, line_tolerance: f64) -> Option<PickHit> {
    let tolerance_sq = line_tolerance * line_tolerance;
    let mut best: Option<PickHit> = None;

    for (id, primitive) in group.iter() {
        let candidate = match primitive.kind() {
            PrimitiveKind::Point => primitive.world_vertices().next().and_then(|center| {
                let radius = primitive.size().base();
                let distance = ray.distance_to_point(center);
                (distance <= radius).then(|| PickHit {
                    primitive: id,
                    distance,
                    depth: (center - ray.origin()).dot(ray.direction()),
                    via_fallback: false,
                })
            }),
            PrimitiveKind::Polyline | PrimitiveKind::ClosedPolyline => primitive
                .world_segments()
                .into_iter()
                .map(|(a, b)| ray.closest_to_segment(a, b))
                .filter(|proximity| proximity.distance_sq <= tolerance_sq)
                .min_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq))
                .map(|proximity| PickHit {
                    primitive: id,
                    distance: proximity.distance_sq.sqrt(),
                    depth: proximity.ray_t,
                    via_fallback: false,
                }),
        };

        if let Some(candidate) = candidate {
            if best.is_none_or(|current| candidate.closer_than(&current)) {
                best = Some(candidate);
            }
        }
    }
    best
}

fn nearest_point_marker(group: &RenderGroup, ray: &Ray, threshold: f64) -> Option<PickHit> {
    group
        .iter()
        .filter(|(_, primitive)| primitive.kind() == PrimitiveKind::Point)
        .filter_map(|(id, primitive)| {
            let center = primitive.world_vertices().next()?;
            let distance = ray.distance_to_point(center);
            (distance < threshold).then(|| PickHit {
                primitive: id,
                distance,
                depth: (center - ray.origin()).dot(ray.direction()),
                via_fallback: true,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// 图元在拾取状态机中的角色。选中始终压过悬停。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emphasis {
    Base,
    Hover,
    Selected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickState {
    pub hovered: Option<PrimitiveId>,
    pub selected: Option<PrimitiveId>,
}

/// 纯状态转换的结果：新状态以及角色发生变化的图元。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: PickState,
    pub changes: Vec<(PrimitiveId, Emphasis)>,
}

impl PickState {
    pub fn emphasis_of(&self, id: PrimitiveId) -> Emphasis {
        if self.selected == Some(id) {
            Emphasis::Selected
        } else if self.hovered == Some(id) {
            Emphasis::Hover
        } else {
            Emphasis::Base
        }
    }

    pub fn on_pointer_move(self, hit: Option<PrimitiveId>) -> Transition {
        self.transition_to(PickState {
            hovered: hit,
            selected: self.selected,
        })
    }

    /// 指针离开画布时总是清除悬停，与选中状态无关。
    pub fn on_pointer_leave(self) -> Transition {
        self.transition_to(PickState {
            hovered: None,
            selected: self.selected,
        })
    }

    /// 点击空白清除选中；点击图元替换选中。
    pub fn on_pointer_down(self, hit: Option<PrimitiveId>) -> Transition {
        self.transition_to(PickState {
            hovered: self.hovered,
            selected: hit,
        })
    }

    pub fn on_release(self) -> Transition {
        self.transition_to(PickState::default())
    }

    fn transition_to(self, next: PickState) -> Transition {
        let mut changes = Vec::new();
        let candidates = [self.hovered, self.selected, next.hovered, next.selected];
        for id in candidates.into_iter().flatten() {
            if changes.iter().any(|(seen, _)| *seen == id) {
                continue;
            }
            let after = next.emphasis_of(id);
            if self.emphasis_of(id) != after {
                changes.push((id, after));
            }
        }
        Transition {
            state: next,
            changes,
        }
    }
}

/// 悬停/选中时的线宽与点尺寸倍率。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackFactors {
    pub hover_line: f64,
    pub hover_point: f64,
    pub selected_line: f64,
    pub selected_point: f64,
}

impl Default for FeedbackFactors {
    fn default() -> Self {
        Self {
            hover_line: 2.0,
            hover_point: 1.7,
            selected_line: 3.0,
            selected_point: 2.5,
        }
    }
}

impl FeedbackFactors {
    pub fn factor(&self, kind: PrimitiveKind, emphasis: Emphasis) -> f64 {
        match (emphasis, kind) {
            (Emphasis::Base, _) => 1.0,
            (Emphasis::Hover, PrimitiveKind::Point) => self.hover_point,
            (Emphasis::Hover, _) => self.hover_line,
            (Emphasis::Selected, PrimitiveKind::Point) => self.selected_point,
            (Emphasis::Selected, _) => self.selected_line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// 非主键点击，不做处理。
    Ignored,
    EmptySpace,
    Primitive(PrimitiveId),
}

/// 持有 `{hovered, selected}` 的拾取会话，把状态转换落到图元尺寸上。
#[derive(Debug, Clone)]
pub struct PickingSession {
    picker: Picker,
    factors: FeedbackFactors,
    state: PickState,
}

impl PickingSession {
    pub fn new(picker: Picker, factors: FeedbackFactors) -> Self {
        Self {
            picker,
            factors,
            state: PickState::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> PickState {
        self.state
    }

    #[inline]
    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    pub fn pointer_move(
        &mut self,
        group: &mut RenderGroup,
        camera: &Camera,
        screen: DVec2,
    ) -> Option<PrimitiveId> {
        let hit = self
            .picker
            .pick(group, camera, screen, PickIntent::Hover)
            .map(|hit| hit.primitive);
        let transition = self.state.on_pointer_move(hit);
        self.commit(group, transition);
        hit
    }

    pub fn pointer_leave(&mut self, group: &mut RenderGroup) {
        let transition = self.state.on_pointer_leave();
        self.commit(group, transition);
    }

    pub fn pointer_down(
        &mut self,
        group: &mut RenderGroup,
        camera: &Camera,
        screen: DVec2,
        button: PointerButton,
    ) -> ClickOutcome {
        if button != PointerButton::Primary {
            return ClickOutcome::Ignored;
        }
        let hit = self
            .picker
            .pick(group, camera, screen, PickIntent::Click)
            .map(|hit| hit.primitive);
        let transition = self.state.on_pointer_down(hit);
        self.commit(group, transition);
        match hit {
            Some(id) => ClickOutcome::Primitive(id),
            None => ClickOutcome::EmptySpace,
        }
    }

    /// 恢复所有被触碰图元的尺寸并清空状态。
    pub fn release(&mut self, group: &mut RenderGroup) {
        let transition = self.state.on_release();
        self.commit(group, transition);
    }

    fn commit(&mut self, group: &mut RenderGroup, transition: Transition) {
        for (id, emphasis) in &transition.changes {
            let Some(primitive) = group.get_mut(*id) else {
                continue;
            };
            let factor = self.factors.factor(primitive.kind(), *emphasis);
            let size = primitive.size_mut();
            match emphasis {
                Emphasis::Base => size.restore(),
                _ => size.apply_multiplier(factor),
            }
        }
        self.state = transition.state;
    }
}
