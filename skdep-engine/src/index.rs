use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use skdep_core::model::{ElementKey, EntityId, FeatureId, FeatureKey, MetadataTree, SketchEntity};
use tracing::debug;

pub type EntitySet = HashSet<EntityId>;

const UNKNOWN_FEATURE_TYPE: &str = "(unknown)";

/// 由依赖边构建的双向索引：元素/特征 → 实体集合。
///
/// 索引只能整体重建，不做增量修补。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyIndex {
    element_to_entities: HashMap<ElementKey, EntitySet>,
    feature_to_entities: HashMap<FeatureKey, EntitySet>,
}

impl DependencyIndex {
    /// 遍历每个实体的每条依赖边；缺少文档或元素 ID 的边直接跳过。
    pub fn build(entities: &[SketchEntity]) -> Self {
        let mut index = Self::default();
        let mut skipped = 0usize;

        for entity in entities {
            for edge in &entity.edges {
                let Some(element_key) = edge.element_key() else {
                    skipped += 1;
                    continue;
                };
                index
                    .element_to_entities
                    .entry(element_key)
                    .or_default()
                    .insert(entity.id.clone());

                if let Some(feature_key) = edge.feature_key() {
                    index
                        .feature_to_entities
                        .entry(feature_key)
                        .or_default()
                        .insert(entity.id.clone());
                }
            }
        }

        debug!(
            elements = index.element_to_entities.len(),
            features = index.feature_to_entities.len(),
            skipped_edges = skipped,
            "依赖索引已重建"
        );
        index
    }

    #[inline]
    pub fn element_count(&self) -> usize {
        self.element_to_entities.len()
    }

    #[inline]
    pub fn feature_count(&self) -> usize {
        self.feature_to_entities.len()
    }

    /// 未知键返回空集合。
    pub fn entities_for_element(&self, key: &ElementKey) -> EntitySet {
        self.element_to_entities.get(key).cloned().unwrap_or_default()
    }

    pub fn entities_for_feature(&self, key: &FeatureKey) -> EntitySet {
        self.feature_to_entities.get(key).cloned().unwrap_or_default()
    }

    pub(crate) fn extend_with_element(&self, key: &ElementKey, out: &mut EntitySet) {
        if let Some(set) = self.element_to_entities.get(key) {
            out.extend(set.iter().cloned());
        }
    }

    pub(crate) fn extend_with_feature(&self, key: &FeatureKey, out: &mut EntitySet) {
        if let Some(set) = self.feature_to_entities.get(key) {
            out.extend(set.iter().cloned());
        }
    }

    pub fn element_keys(&self) -> impl Iterator<Item = &ElementKey> {
        self.element_to_entities.keys()
    }

    pub fn feature_keys(&self) -> impl Iterator<Item = &FeatureKey> {
        self.feature_to_entities.keys()
    }
}

/// 按特征聚合的可读摘要。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSummary {
    pub name: String,
    pub feature_type: String,
    pub entities: BTreeSet<EntityId>,
}

/// 以特征 ID 为键聚合引用它的实体；名称缺失回退到 ID，类型缺失回退到 `(unknown)`。
pub fn build_feature_summary(
    entities: &[SketchEntity],
    metadata: &MetadataTree,
) -> BTreeMap<FeatureId, FeatureSummary> {
    let mut summary: BTreeMap<FeatureId, FeatureSummary> = BTreeMap::new();

    for entity in entities {
        for edge in &entity.edges {
            let Some(feature) = edge.feature.as_ref() else {
                continue;
            };
            let info = match (edge.document.as_ref(), edge.element.as_ref()) {
                (Some(document), Some(element)) => {
                    metadata.feature(document.as_str(), element.as_str(), feature.as_str())
                }
                _ => None,
            };

            let entry = summary.entry(feature.clone()).or_insert_with(|| FeatureSummary {
                name: info
                    .and_then(|info| info.name.clone())
                    .unwrap_or_else(|| feature.to_string()),
                feature_type: info
                    .and_then(|info| info.feature_type.clone())
                    .unwrap_or_else(|| UNKNOWN_FEATURE_TYPE.to_string()),
                entities: BTreeSet::new(),
            });
            entry.entities.insert(entity.id.clone());
        }
    }

    summary
}
