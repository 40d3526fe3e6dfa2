use skdep_core::model::SketchEntity;

use crate::index::EntitySet;

/// 依赖计数范围过滤器，`global_min ≤ lo, hi ≤ global_max` 始终成立。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFilter {
    lo: u32,
    hi: u32,
    global_min: u32,
    global_max: u32,
}

impl RangeFilter {
    /// 以全局范围初始化，初始区间覆盖全部实体。
    pub fn new(global_min: u32, global_max: u32) -> Self {
        let (global_min, global_max) = (global_min.min(global_max), global_min.max(global_max));
        Self {
            lo: global_min,
            hi: global_max,
            global_min,
            global_max,
        }
    }

    pub fn from_entities(entities: &[SketchEntity]) -> Self {
        let mut counts = entities.iter().map(SketchEntity::dependency_count);
        match counts.next() {
            Some(first) => {
                let (lo, hi) = counts.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));
                Self::new(lo, hi)
            }
            None => Self::new(0, 0),
        }
    }

    #[inline]
    pub fn global_min(&self) -> u32 {
        self.global_min
    }

    #[inline]
    pub fn global_max(&self) -> u32 {
        self.global_max
    }

    /// 原始（已夹取）的上下界，不保证 `lo ≤ hi`。
    #[inline]
    pub fn bounds(&self) -> (u32, u32) {
        (self.lo, self.hi)
    }

    /// 两端都夹取到全局范围内，不要求 `lo ≤ hi`。
    pub fn set_range(&mut self, lo: i64, hi: i64) -> (u32, u32) {
        self.lo = self.clamp(lo);
        self.hi = self.clamp(hi);
        self.effective()
    }

    pub fn reset(&mut self) -> (u32, u32) {
        self.lo = self.global_min;
        self.hi = self.global_max;
        self.effective()
    }

    /// 实际生效区间 `[min(lo, hi), max(lo, hi)]`。
    #[inline]
    pub fn effective(&self) -> (u32, u32) {
        (self.lo.min(self.hi), self.lo.max(self.hi))
    }

    #[inline]
    pub fn contains(&self, count: u32) -> bool {
        let (lo, hi) = self.effective();
        (lo..=hi).contains(&count)
    }

    pub fn active_set(&self, entities: &[SketchEntity]) -> EntitySet {
        entities
            .iter()
            .filter(|entity| self.contains(entity.dependency_count()))
            .map(|entity| entity.id.clone())
            .collect()
    }

    /// 颜色重映射用的跨度，下限 1e-9。
    #[inline]
    pub fn color_span(&self) -> f64 {
        (f64::from(self.global_max) - f64::from(self.global_min)).max(1e-9)
    }

    /// 图例刻度跨度，下限 1。
    #[inline]
    fn legend_span(&self) -> f64 {
        (f64::from(self.global_max) - f64::from(self.global_min)).max(1.0)
    }

    /// 计数值在图例上的相对位置，结果位于 `[0, 1]`。
    pub fn value_to_fraction(&self, value: f64) -> f64 {
        ((value - f64::from(self.global_min)) / self.legend_span()).clamp(0.0, 1.0)
    }

    /// 图例位置换算回计数值（四舍五入并夹取）。
    pub fn fraction_to_value(&self, fraction: f64) -> u32 {
        let value = f64::from(self.global_min) + fraction.clamp(0.0, 1.0) * self.legend_span();
        self.clamp(value.round() as i64)
    }

    fn clamp(&self, value: i64) -> u32 {
        let clamped = value.clamp(i64::from(self.global_min), i64::from(self.global_max));
        u32::try_from(clamped).unwrap_or(self.global_min)
    }
}
