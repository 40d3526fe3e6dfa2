use std::collections::BTreeMap;

use glam::DVec2;
use skdep_core::geometry::Plane;
use skdep_core::model::{EntityId, FeatureId, SketchData};
use tracing::{debug, info, warn};

use crate::errors::EngineError;
use crate::highlight::{HighlightEngine, HighlightSource, HighlightStyle};
use crate::index::{DependencyIndex, EntitySet, FeatureSummary, build_feature_summary};
use crate::inspect::{DEFAULT_LINK_BASE, DependencyBreakdown, PinnedFeature};
use crate::overlay::OverlayManager;
use crate::picking::{
    Camera, ClickOutcome, FeedbackFactors, PickState, Picker, PickingSession, PointerButton,
    ToleranceModel,
};
use crate::primitive::{PrimitiveId, RenderGroup, TessellationOptions};
use crate::range::RangeFilter;
use crate::search::{ExclusionRule, SearchIndex, SearchNode, SearchOutcome};

/// 核心向 UI 发出的回调，默认实现为空操作。
pub trait SessionObserver {
    fn on_highlight_entities(&mut self, _set: Option<&EntitySet>) {}
    fn on_select(&mut self, _entity: Option<&EntityId>, _screen: DVec2) {}
    fn on_range_change(&mut self, _lo: u32, _hi: u32) {}
    fn flash_not_found(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub tessellation: TessellationOptions,
    pub tolerance: ToleranceModel,
    pub feedback: FeedbackFactors,
    pub highlight: HighlightStyle,
    pub exclusion: ExclusionRule,
    pub selection_overlay_width: f64,
    pub search_overlay_width: f64,
    pub link_base: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tessellation: TessellationOptions::default(),
            tolerance: ToleranceModel::default(),
            feedback: FeedbackFactors::default(),
            highlight: HighlightStyle::default(),
            exclusion: ExclusionRule::default(),
            selection_overlay_width: 4.0,
            search_overlay_width: 6.0,
            link_base: DEFAULT_LINK_BASE.to_string(),
        }
    }
}

/// 一次加载的会话上下文，持有全部引擎实例；`teardown` 是唯一的清理入口。
pub struct SketchSession {
    data: SketchData,
    index: DependencyIndex,
    features: BTreeMap<FeatureId, FeatureSummary>,
    group: RenderGroup,
    range: RangeFilter,
    highlight: HighlightEngine,
    search: SearchIndex,
    picking: Option<PickingSession>,
    overlays: OverlayManager,
    observer: Box<dyn SessionObserver>,
    options: SessionOptions,
}

impl SketchSession {
    pub fn new(data: SketchData, options: SessionOptions, observer: Box<dyn SessionObserver>) -> Self {
        let index = DependencyIndex::build(&data.entities);
        let features = build_feature_summary(&data.entities, &data.metadata);
        let mut group = RenderGroup::from_entities(&data.entities, &options.tessellation);
        let range = RangeFilter::from_entities(&data.entities);
        group.bake_base_colors(range.global_min(), range.global_max());

        let mut highlight =
            HighlightEngine::new(options.highlight, range.global_min(), range.global_max());
        let (lo, hi) = range.effective();
        highlight.apply_range(&mut group, lo, hi, Some(range.active_set(&data.entities)));

        info!(
            entities = data.entities.len(),
            primitives = group.len(),
            features = features.len(),
            global_min = range.global_min(),
            global_max = range.global_max(),
            "草图会话已建立"
        );

        Self {
            search: SearchIndex::new(options.exclusion.clone()),
            data,
            index,
            features,
            group,
            range,
            highlight,
            picking: None,
            overlays: OverlayManager::new(),
            observer,
            options,
        }
    }

    #[inline]
    pub fn data(&self) -> &SketchData {
        &self.data
    }

    #[inline]
    pub fn index(&self) -> &DependencyIndex {
        &self.index
    }

    #[inline]
    pub fn feature_summary(&self) -> &BTreeMap<FeatureId, FeatureSummary> {
        &self.features
    }

    #[inline]
    pub fn group(&self) -> &RenderGroup {
        &self.group
    }

    #[inline]
    pub fn range(&self) -> &RangeFilter {
        &self.range
    }

    #[inline]
    pub fn highlight(&self) -> &HighlightEngine {
        &self.highlight
    }

    #[inline]
    pub fn search_index(&self) -> &SearchIndex {
        &self.search
    }

    #[inline]
    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    #[inline]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn picking_state(&self) -> PickState {
        self.picking
            .as_ref()
            .map(PickingSession::state)
            .unwrap_or_default()
    }

    /// 以当前相机作为拾取缩放基线。
    pub fn attach_camera(&mut self, camera: &Camera) {
        if let Some(picking) = self.picking.as_mut() {
            picking.release(&mut self.group);
        }
        self.picking = Some(new_picking(&self.options, camera));
    }

    /// 设置依赖计数范围（两端夹取），范围结果立即成为权威高亮来源。
    pub fn set_range(&mut self, lo: i64, hi: i64) -> (u32, u32) {
        let (lo, hi) = self.range.set_range(lo, hi);
        self.apply_range(lo, hi)
    }

    pub fn reset_range(&mut self) -> (u32, u32) {
        let (lo, hi) = self.range.reset();
        self.apply_range(lo, hi)
    }

    fn apply_range(&mut self, lo: u32, hi: u32) -> (u32, u32) {
        let set = self.range.active_set(&self.data.entities);
        info!(lo, hi, active = set.len(), "范围过滤已更新");
        self.highlight.apply_range(&mut self.group, lo, hi, Some(set));
        self.observer.on_range_change(lo, hi);
        (lo, hi)
    }

    /// 自由文本查询。锁定模式下直接高亮该特征；无匹配时通知 UI 闪烁提示。
    pub fn search(&mut self, query: &str, list_all_on_empty: bool) -> SearchOutcome {
        let outcome = self
            .search
            .search(&self.data.metadata, &self.index, query, list_all_on_empty);
        match &outcome {
            SearchOutcome::Pinned { entities, .. } => {
                self.highlight_entities(Some(entities.clone()));
            }
            SearchOutcome::NoMatches => {
                self.observer.flash_not_found();
                self.highlight_entities(None);
            }
            SearchOutcome::Hidden => self.highlight_entities(None),
            SearchOutcome::Results(_) => {}
        }
        outcome
    }

    /// 进入锁定模式并以特征名称（缺失时为 ID）作为查询文本。
    pub fn set_pinned_feature_and_search(&mut self, pinned: PinnedFeature) -> SearchOutcome {
        let query = if pinned.name.is_empty() {
            pinned.key.feature.to_string()
        } else {
            pinned.name.clone()
        };
        self.search.pin(pinned);
        self.search(&query, false)
    }

    /// 退出锁定模式，不改变当前高亮。
    pub fn clear_pin(&mut self) {
        self.search.clear_pin();
    }

    /// 点击结果面板中的节点，以焦点覆盖高亮其实体并集。
    pub fn activate_node(&mut self, node: &SearchNode) -> EntitySet {
        let set = self.search.entities_for_node(&self.index, node);
        self.highlight_entities(Some(set.clone()));
        set
    }

    /// 焦点覆盖：先清除叠加层并回到范围状态，非空集合再覆盖并加叠加层。
    pub fn highlight_entities(&mut self, set: Option<EntitySet>) {
        self.overlays.clear_overlays();
        self.observer.on_highlight_entities(set.as_ref());
        match set {
            Some(set) if !set.is_empty() => {
                self.overlays
                    .show_for_set(&self.group, &set, self.options.search_overlay_width);
                self.highlight
                    .apply_active_set(&mut self.group, Some(set), HighlightSource::Focus);
            }
            _ => self.highlight.restore_range(&mut self.group),
        }
    }

    /// 显式聚焦单个实体，未知 ID 返回错误。
    pub fn focus_entity(&mut self, entity: &str) -> Result<(), EngineError> {
        let id = self
            .group
            .find_by_entity(entity)
            .ok_or_else(|| EngineError::EntityNotFound(entity.to_string()))?;
        self.focus_primitive(id);
        Ok(())
    }

    fn focus_primitive(&mut self, id: PrimitiveId) {
        self.overlays.clear_overlays();
        let Some(primitive) = self.group.get(id) else {
            return;
        };
        let entity = primitive.entity().clone();
        let set: EntitySet = std::iter::once(entity).collect();
        self.highlight
            .apply_active_set(&mut self.group, Some(set), HighlightSource::Focus);
        self.overlays
            .add_for_primitive(&self.group, id, self.options.selection_overlay_width);
    }

    pub fn clear_focus(&mut self) {
        self.overlays.clear_overlays();
        self.highlight.restore_range(&mut self.group);
        self.observer.on_highlight_entities(self.highlight.active_set());
    }

    /// 指针移动，返回悬停实体（用于提示框）。
    pub fn pointer_move(&mut self, camera: &Camera, screen: DVec2) -> Option<EntityId> {
        let picking = self
            .picking
            .get_or_insert_with(|| new_picking(&self.options, camera));
        let hovered = picking.pointer_move(&mut self.group, camera, screen)?;
        self.group.get(hovered).map(|primitive| primitive.entity().clone())
    }

    pub fn pointer_leave(&mut self) {
        if let Some(picking) = self.picking.as_mut() {
            picking.pointer_leave(&mut self.group);
        }
    }

    /// 指针按下：命中图元则焦点覆盖并通知选中，落空则恢复范围并通知空选中。
    pub fn pointer_down(
        &mut self,
        camera: &Camera,
        screen: DVec2,
        button: PointerButton,
    ) -> Option<EntityId> {
        let picking = self
            .picking
            .get_or_insert_with(|| new_picking(&self.options, camera));
        let outcome = picking.pointer_down(&mut self.group, camera, screen, button);
        match outcome {
            ClickOutcome::Ignored => None,
            ClickOutcome::EmptySpace => {
                self.overlays.clear_overlays();
                self.highlight.restore_range(&mut self.group);
                debug!(x = screen.x, y = screen.y, "点击空白区域");
                self.observer.on_select(None, screen);
                None
            }
            ClickOutcome::Primitive(id) => {
                self.focus_primitive(id);
                let entity = self.group.get(id).map(|primitive| primitive.entity().clone());
                debug!(entity = ?entity, x = screen.x, y = screen.y, "选中实体");
                self.observer.on_select(entity.as_ref(), screen);
                entity
            }
        }
    }

    /// 实体的依赖明细；未知实体或无依赖边时得到空明细。
    pub fn dependencies_of(&self, entity: &str) -> DependencyBreakdown {
        match self.data.entity(entity) {
            Some(found) => DependencyBreakdown::for_entity(found, &self.data.metadata),
            None => DependencyBreakdown {
                entity: EntityId::new(entity),
                documents: Vec::new(),
            },
        }
    }

    /// 恢复图元尺寸、释放叠加层与拾取状态，并回到全量显示。
    pub fn teardown(&mut self) {
        if let Some(mut picking) = self.picking.take() {
            picking.release(&mut self.group);
        }
        self.overlays.clear_overlays();
        self.search.clear_pin();
        self.highlight
            .apply_active_set(&mut self.group, None, HighlightSource::Range);
        debug!("草图会话已释放");
    }
}

fn new_picking(options: &SessionOptions, camera: &Camera) -> PickingSession {
    let reference = Plane::horizontal(options.tessellation.top_plane_offset);
    let picker = Picker::new(options.tolerance, reference, camera);
    debug!(baseline = picker.baseline_distance(), "拾取基线已记录");
    PickingSession::new(picker, options.feedback)
}

/// 重载凭证，单调递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReloadTicket(u64);

impl ReloadTicket {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// 持有当前会话；过期的重载结果被丢弃，当前会话保持不变。
#[derive(Default)]
pub struct SessionSlot {
    generation: u64,
    current: Option<SketchSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        debug!(generation = self.generation, "开始重载");
        ReloadTicket(self.generation)
    }

    /// 仅接受最新凭证的结果，接受时先释放旧会话。
    pub fn complete_reload(&mut self, ticket: ReloadTicket, session: SketchSession) -> bool {
        if ticket.0 != self.generation {
            warn!(
                ticket = ticket.0,
                latest = self.generation,
                "丢弃过期的重载结果"
            );
            return false;
        }
        if let Some(mut previous) = self.current.take() {
            previous.teardown();
        }
        self.current = Some(session);
        true
    }

    #[inline]
    pub fn current(&self) -> Option<&SketchSession> {
        self.current.as_ref()
    }

    #[inline]
    pub fn current_mut(&mut self) -> Option<&mut SketchSession> {
        self.current.as_mut()
    }

    pub fn teardown(&mut self) {
        if let Some(mut session) = self.current.take() {
            session.teardown();
        }
    }
}
