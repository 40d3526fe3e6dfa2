use skdep_core::color::{NEUTRAL_GRAY, Rgb};
use tracing::{debug, trace};

use crate::index::EntitySet;
use crate::primitive::{DRAW_ORDER_DIMMED, DRAW_ORDER_ELEVATED, RenderGroup};

/// 高亮请求的来源。同一时刻只有一个来源具有权威。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighlightSource {
    Range,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub dimmed_color: Rgb,
    pub range_dim_opacity: f32,
    pub focus_dim_opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            dimmed_color: NEUTRAL_GRAY,
            range_dim_opacity: 0.85,
            focus_dim_opacity: 0.3,
        }
    }
}

/// 最近一次范围过滤的结果，用于清除焦点覆盖后的恢复。
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSnapshot {
    pub lo: u32,
    pub hi: u32,
    pub active: Option<EntitySet>,
}

/// 唯一允许修改图元颜色、透明度和绘制顺序的组件。
///
/// 创建时即以全局范围作为权威来源，`last_range` 始终存在。
#[derive(Debug, Clone)]
pub struct HighlightEngine {
    style: HighlightStyle,
    active: Option<EntitySet>,
    authoritative: HighlightSource,
    last_range: RangeSnapshot,
}

impl HighlightEngine {
    pub fn new(style: HighlightStyle, global_min: u32, global_max: u32) -> Self {
        Self {
            style,
            active: None,
            authoritative: HighlightSource::Range,
            last_range: RangeSnapshot {
                lo: global_min,
                hi: global_max,
                active: None,
            },
        }
    }

    #[inline]
    pub fn style(&self) -> &HighlightStyle {
        &self.style
    }

    /// 当前激活集合；`None` 表示不过滤。
    #[inline]
    pub fn active_set(&self) -> Option<&EntitySet> {
        self.active.as_ref()
    }

    #[inline]
    pub fn authoritative_source(&self) -> HighlightSource {
        self.authoritative
    }

    #[inline]
    pub fn last_range(&self) -> &RangeSnapshot {
        &self.last_range
    }

    /// 范围过滤结果：缓存为 `last_range` 并立即成为权威来源。
    pub fn apply_range(&mut self, group: &mut RenderGroup, lo: u32, hi: u32, set: Option<EntitySet>) {
        self.last_range.lo = lo;
        self.last_range.hi = hi;
        self.apply_active_set(group, set, HighlightSource::Range);
    }

    /// 唯一入口。`Focus` 为覆盖而非合并；空或 `None` 的焦点结果恢复最近的范围集合。
    /// `Range` 沿用当前缓存的区间，只替换其激活集合。
    pub fn apply_active_set(
        &mut self,
        group: &mut RenderGroup,
        set: Option<EntitySet>,
        source: HighlightSource,
    ) {
        match source {
            HighlightSource::Range => {
                self.last_range.active = set.clone();
                self.authoritative = HighlightSource::Range;
                self.paint(group, set, self.style.range_dim_opacity);
            }
            HighlightSource::Focus => match set {
                Some(set) if !set.is_empty() => {
                    debug!(entities = set.len(), "焦点覆盖生效");
                    self.authoritative = HighlightSource::Focus;
                    self.paint(group, Some(set), self.style.focus_dim_opacity);
                }
                _ => self.restore_range(group),
            },
        }
    }

    /// 清除焦点覆盖，回到最近一次范围过滤的状态；从未设置范围时显示全部。
    pub fn restore_range(&mut self, group: &mut RenderGroup) {
        let restored = self.last_range.active.clone();
        debug!(
            restored = restored.as_ref().map(|set| set.len()),
            "焦点覆盖已清除，恢复范围过滤"
        );
        self.authoritative = HighlightSource::Range;
        self.paint(group, restored, self.style.range_dim_opacity);
    }

    fn paint(&mut self, group: &mut RenderGroup, set: Option<EntitySet>, dim_opacity: f32) {
        let mut dimmed = 0usize;
        for primitive in group.iter_mut() {
            let base = primitive.paint().base_color();
            match set.as_ref() {
                None => {
                    let order = primitive.base_draw_order();
                    primitive.set_paint(base, 1.0, order);
                }
                Some(set) if set.contains(primitive.entity()) => {
                    primitive.set_paint(base, 1.0, DRAW_ORDER_ELEVATED);
                }
                Some(_) => {
                    primitive.set_paint(self.style.dimmed_color, dim_opacity, DRAW_ORDER_DIMMED);
                    dimmed += 1;
                }
            }
        }
        trace!(dimmed, show_all = set.is_none(), "图元已重绘");
        self.active = set;
    }
}
