use glam::{DAffine3, DVec3};
use skdep_core::color::Rgb;
use skdep_core::model::EntityId;
use tracing::debug;

use crate::index::EntitySet;
use crate::primitive::{DRAW_ORDER_OVERLAY, PrimitiveId, PrimitiveKind, RenderGroup};

/// 基础图元的加粗副本，仅用于视觉强调，永远不参与拾取。
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub source: PrimitiveId,
    pub entity: EntityId,
    pub closed: bool,
    pub vertices: Vec<DVec3>,
    pub transform: DAffine3,
    pub color: Rgb,
    pub line_width: f64,
    pub draw_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayManager {
    overlays: Vec<Overlay>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.overlays.len()
    }

    #[inline]
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// 为集合中的每个折线图元创建叠加层；先释放旧的叠加层。
    pub fn show_for_set(&mut self, group: &RenderGroup, set: &EntitySet, line_width: f64) -> usize {
        self.clear_overlays();
        let ids: Vec<PrimitiveId> = group
            .iter()
            .filter(|(_, primitive)| set.contains(primitive.entity()))
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            self.add_for_primitive(group, id, line_width);
        }
        debug!(overlays = self.overlays.len(), line_width, "叠加层已创建");
        self.overlays.len()
    }

    /// 复制图元的顶点与变换，颜色取烘焙色。点标记不生成叠加层。
    pub fn add_for_primitive(&mut self, group: &RenderGroup, id: PrimitiveId, line_width: f64) -> bool {
        let Some(primitive) = group.get(id) else {
            return false;
        };
        if !primitive.kind().is_polyline() {
            return false;
        }
        self.overlays.push(Overlay {
            source: id,
            entity: primitive.entity().clone(),
            closed: primitive.kind() == PrimitiveKind::ClosedPolyline,
            vertices: primitive.vertices().to_vec(),
            transform: primitive.transform(),
            color: primitive.paint().base_color(),
            line_width,
            draw_order: DRAW_ORDER_OVERLAY,
        });
        true
    }

    pub fn clear_overlays(&mut self) -> usize {
        let released = self.overlays.len();
        self.overlays.clear();
        if released > 0 {
            debug!(released, "叠加层已释放");
        }
        released
    }
}
