use skdep_core::model::{
    DocumentId, ElementId, ElementInfo, ElementKey, FeatureId, FeatureInfo, FeatureKey, MetadataTree,
    WorkspaceId,
};
use tracing::{debug, info};

use crate::index::{DependencyIndex, EntitySet};
use crate::inspect::PinnedFeature;

pub const DEFAULT_EXCLUDED_LABEL: &str = "Master Sketch";

/// 名称（不区分大小写）包含哨兵标签的条目在每一层都被隐藏。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    sentinel: Option<String>,
}

impl ExclusionRule {
    pub fn new(label: impl AsRef<str>) -> Self {
        let label = label.as_ref().trim();
        Self {
            sentinel: (!label.is_empty()).then(|| label.to_lowercase()),
        }
    }

    pub fn disabled() -> Self {
        Self { sentinel: None }
    }

    pub fn excludes(&self, name: &str) -> bool {
        self.sentinel
            .as_deref()
            .is_some_and(|sentinel| name.to_lowercase().contains(sentinel))
    }
}

impl Default for ExclusionRule {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_LABEL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureHit {
    pub id: FeatureId,
    pub name: String,
    pub feature_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHit {
    pub id: ElementId,
    pub name: String,
    pub features: Vec<FeatureHit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHit {
    pub id: DocumentId,
    pub workspace: Option<WorkspaceId>,
    pub name: String,
    pub elements: Vec<ElementHit>,
}

/// 过滤后的文档 → 元素 → 特征 层级。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub documents: Vec<DocumentHit>,
}

impl SearchResults {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.elements.len()).sum()
    }

    pub fn feature_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|doc| &doc.elements)
            .map(|element| element.features.len())
            .sum()
    }

    pub fn document(&self, id: &str) -> Option<&DocumentHit> {
        self.documents.iter().find(|doc| doc.id.as_str() == id)
    }
}

/// 一次查询的结果。`NoMatches` 与空查询明确区分，用于驱动失败提示。
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// 空查询且调用方未要求列出全部。
    Hidden,
    Results(SearchResults),
    /// 锁定模式：恰好一个特征及其实体集合。
    Pinned {
        results: SearchResults,
        entities: EntitySet,
    },
    NoMatches,
}

/// 结果面板中可点击的节点。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchNode {
    Document(DocumentId),
    Element(ElementKey),
    Feature(FeatureKey),
}

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    exclusion: ExclusionRule,
    pinned: Option<PinnedFeature>,
    last_results: SearchResults,
}

impl SearchIndex {
    pub fn new(exclusion: ExclusionRule) -> Self {
        Self {
            exclusion,
            pinned: None,
            last_results: SearchResults::default(),
        }
    }

    #[inline]
    pub fn pinned(&self) -> Option<&PinnedFeature> {
        self.pinned.as_ref()
    }

    pub fn pin(&mut self, pinned: PinnedFeature) {
        info!(
            document = %pinned.key.document,
            element = %pinned.key.element,
            feature = %pinned.key.feature,
            "进入锁定查询"
        );
        self.pinned = Some(pinned);
    }

    pub fn clear_pin(&mut self) {
        self.pinned = None;
    }

    /// 最近一次非空查询展示的层级。
    #[inline]
    pub fn last_results(&self) -> &SearchResults {
        &self.last_results
    }

    /// 执行查询。非空查询文本与锁定特征的名称或 ID 不同时自动退出锁定模式；空查询保持锁定。
    pub fn search(
        &mut self,
        metadata: &MetadataTree,
        index: &DependencyIndex,
        query: &str,
        list_all_on_empty: bool,
    ) -> SearchOutcome {
        let query = query.trim();

        if !query.is_empty()
            && self.pinned.as_ref().is_some_and(|pinned| !pinned.matches_query(query))
        {
            debug!(query, "查询已修改，退出锁定模式");
            self.pinned = None;
        }

        if let Some(pinned) = self.pinned.as_ref() {
            let results = pinned_results(metadata, pinned);
            let entities = index.entities_for_feature(&pinned.key);
            self.last_results = results.clone();
            return SearchOutcome::Pinned { results, entities };
        }

        if query.is_empty() && !list_all_on_empty {
            self.last_results = SearchResults::default();
            return SearchOutcome::Hidden;
        }

        let results = self.filter(metadata, &query.to_lowercase());
        if results.is_empty() {
            info!(query, "没有匹配项");
            self.last_results = SearchResults::default();
            return SearchOutcome::NoMatches;
        }
        debug!(
            query,
            documents = results.documents.len(),
            elements = results.element_count(),
            features = results.feature_count(),
            "查询完成"
        );
        self.last_results = results.clone();
        SearchOutcome::Results(results)
    }

    /// 节点对应的实体并集。文档节点合并结果中列出的各元素集合。
    pub fn entities_for_node(&self, index: &DependencyIndex, node: &SearchNode) -> EntitySet {
        let mut out = EntitySet::new();
        match node {
            SearchNode::Document(document) => {
                if let Some(hit) = self.last_results.document(document.as_str()) {
                    for element in &hit.elements {
                        index.extend_with_element(
                            &ElementKey::new(document.clone(), element.id.clone()),
                            &mut out,
                        );
                    }
                }
            }
            SearchNode::Element(key) => index.extend_with_element(key, &mut out),
            SearchNode::Feature(key) => index.extend_with_feature(key, &mut out),
        }
        out
    }

    fn filter(&self, metadata: &MetadataTree, needle: &str) -> SearchResults {
        let matches = |text: &str| needle.is_empty() || text.to_lowercase().contains(needle);
        let mut documents = Vec::new();

        for (doc_id, doc) in metadata.documents() {
            let doc_name = doc.name.clone().unwrap_or_else(|| doc_id.to_string());
            if self.exclusion.excludes(&doc_name) {
                continue;
            }
            let doc_matches = matches(&doc_name) || matches(doc_id.as_str());

            let mut elements = Vec::new();
            for (el_id, element) in &doc.elements {
                let el_name = element_name(el_id, element);
                if self.exclusion.excludes(&el_name) {
                    continue;
                }
                let el_matches = matches(&el_name) || matches(el_id.as_str());

                let features: Vec<FeatureHit> = element
                    .features
                    .iter()
                    .map(|(id, info)| feature_hit(id, info))
                    .filter(|hit| !self.exclusion.excludes(&hit.name))
                    .filter(|hit| {
                        doc_matches || el_matches || matches(&hit.name) || matches(hit.id.as_str())
                    })
                    .collect();

                if doc_matches || el_matches || !features.is_empty() {
                    elements.push(ElementHit {
                        id: el_id.clone(),
                        name: el_name,
                        features,
                    });
                }
            }

            if doc_matches || !elements.is_empty() {
                documents.push(DocumentHit {
                    id: doc_id.clone(),
                    workspace: doc.workspace.clone(),
                    name: doc_name,
                    elements,
                });
            }
        }

        SearchResults { documents }
    }
}

fn element_name(id: &ElementId, info: &ElementInfo) -> String {
    info.name.clone().unwrap_or_else(|| id.to_string())
}

fn feature_hit(id: &FeatureId, info: &FeatureInfo) -> FeatureHit {
    FeatureHit {
        id: id.clone(),
        name: info.name.clone().unwrap_or_else(|| id.to_string()),
        feature_type: info.feature_type.clone().unwrap_or_default(),
    }
}

/// 锁定查询绕过模糊匹配与排除规则；元数据缺失时以 ID 作为名称。
fn pinned_results(metadata: &MetadataTree, pinned: &PinnedFeature) -> SearchResults {
    let key = &pinned.key;
    let doc = metadata.document(key.document.as_str());
    let element = metadata.element(key.document.as_str(), key.element.as_str());
    let feature = metadata.feature(
        key.document.as_str(),
        key.element.as_str(),
        key.feature.as_str(),
    );

    let feature_name = feature
        .and_then(|info| info.name.clone())
        .or_else(|| (!pinned.name.is_empty()).then(|| pinned.name.clone()))
        .unwrap_or_else(|| key.feature.to_string());

    SearchResults {
        documents: vec![DocumentHit {
            id: key.document.clone(),
            workspace: doc.and_then(|info| info.workspace.clone()),
            name: metadata.document_name(key.document.as_str()),
            elements: vec![ElementHit {
                id: key.element.clone(),
                name: element
                    .and_then(|info| info.name.clone())
                    .unwrap_or_else(|| key.element.to_string()),
                features: vec![FeatureHit {
                    id: key.feature.clone(),
                    name: feature_name,
                    feature_type: feature
                        .and_then(|info| info.feature_type.clone())
                        .unwrap_or_default(),
                }],
            }],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skdep_core::geometry::Point2;
    use skdep_core::model::{DependencyEdge, DocumentInfo, SketchEntity, SketchGeometry};

    fn metadata() -> MetadataTree {
        MetadataTree::new()
            .with_document(
                "d1",
                DocumentInfo::named("Robot Arm")
                    .with_workspace("w1")
                    .with_element(
                        "e1",
                        ElementInfo::named("Gripper")
                            .with_feature("f1", FeatureInfo::new("Extrude 1", "extrude"))
                            .with_feature("f2", FeatureInfo::new("Fillet 1", "fillet")),
                    )
                    .with_element(
                        "e2",
                        ElementInfo::named("Layout")
                            .with_feature("fm", FeatureInfo::new("Master Sketch", "newSketch"))
                            .with_feature("f3", FeatureInfo::new("Revolve 1", "revolve")),
                    ),
            )
            .with_document(
                "d2",
                DocumentInfo::named("Drivebase").with_element(
                    "e3",
                    ElementInfo::named("Frame")
                        .with_feature("f4", FeatureInfo::new("Extrude 2", "extrude")),
                ),
            )
    }

    fn index() -> DependencyIndex {
        let point = |id: &str, edges: Vec<DependencyEdge>| {
            SketchEntity::new(id, SketchGeometry::Point { position: Point2::new(0.0, 0.0) })
                .with_edges(edges)
        };
        DependencyIndex::build(&[
            point("A", vec![DependencyEdge::new("d1", "w1", "e1", "f1")]),
            point("B", vec![DependencyEdge::new("d1", "w1", "e1", "f2")]),
            point(
                "C",
                vec![
                    DependencyEdge::new("d1", "w1", "e2", "fm"),
                    DependencyEdge::new("d2", "w2", "e3", "f4"),
                ],
            ),
        ])
    }

    fn results(outcome: SearchOutcome) -> SearchResults {
        match outcome {
            SearchOutcome::Results(results) => results,
            other => panic!("应返回查询结果，实际为 {other:?}"),
        }
    }

    #[test]
    fn document_match_keeps_all_children() {
        let mut search = SearchIndex::default();
        let found = results(search.search(&metadata(), &index(), "robot", false));
        assert_eq!(found.documents.len(), 1);
        assert_eq!(found.element_count(), 2);
        // 排除规则在文档匹配时依然生效
        assert_eq!(found.feature_count(), 3);
    }

    #[test]
    fn feature_only_match_keeps_only_that_feature() {
        let mut search = SearchIndex::default();
        let found = results(search.search(&metadata(), &index(), "EXTRUDE", false));
        assert_eq!(found.documents.len(), 2);
        let gripper = &found.documents[0].elements[0];
        assert_eq!(gripper.features.len(), 1);
        assert_eq!(gripper.features[0].name, "Extrude 1");
    }

    #[test]
    fn sentinel_is_hidden_but_pinnable() {
        let metadata = metadata();
        let index = index();
        let mut search = SearchIndex::default();
        assert_eq!(search.search(&metadata, &index, "Master Sketch", false), SearchOutcome::NoMatches);

        search.pin(PinnedFeature::new(FeatureKey::new("d1", "e2", "fm"), "Master Sketch"));
        match search.search(&metadata, &index, "Master Sketch", false) {
            SearchOutcome::Pinned { results, entities } => {
                assert_eq!(results.feature_count(), 1);
                assert_eq!(results.documents[0].elements[0].features[0].name, "Master Sketch");
                assert!(entities.contains("C"));
                assert_eq!(entities.len(), 1);
            }
            other => panic!("应处于锁定模式，实际为 {other:?}"),
        }
        assert!(search.pinned().is_some());
        assert!(matches!(
            search.search(&metadata, &index, "fm", false),
            SearchOutcome::Pinned { .. }
        ));

        search.search(&metadata, &index, "Master", false);
        assert!(search.pinned().is_none());
    }

    #[test]
    fn empty_query_keeps_pin() {
        let metadata = metadata();
        let index = index();
        let mut search = SearchIndex::default();
        search.pin(PinnedFeature::new(FeatureKey::new("d1", "e2", "fm"), "Master Sketch"));

        for query in ["", "   "] {
            match search.search(&metadata, &index, query, false) {
                SearchOutcome::Pinned { entities, .. } => assert!(entities.contains("C")),
                other => panic!("空查询应保持锁定，实际为 {other:?}"),
            }
        }
        assert!(search.pinned().is_some());

        assert!(matches!(
            search.search(&metadata, &index, "gripper", false),
            SearchOutcome::Results(_)
        ));
        assert!(search.pinned().is_none());
    }

    #[test]
    fn sentinel_excludes_documents_and_elements_case_insensitively() {
        let metadata = MetadataTree::new()
            .with_document(
                "dm",
                DocumentInfo::named("Master Sketch Doc").with_element(
                    "e1",
                    ElementInfo::named("Gear Box")
                        .with_feature("g1", FeatureInfo::new("Gear Extrude", "extrude")),
                ),
            )
            .with_document(
                "d2",
                DocumentInfo::named("Drivetrain")
                    .with_element(
                        "em",
                        ElementInfo::named("master sketch holder")
                            .with_feature("g2", FeatureInfo::new("Gear Cut", "extrude")),
                    )
                    .with_element(
                        "e3",
                        ElementInfo::named("Wheels")
                            .with_feature("w1", FeatureInfo::new("Wheel Revolve", "revolve")),
                    ),
            );
        let index = DependencyIndex::build(&[]);
        let mut search = SearchIndex::default();

        assert_eq!(search.search(&metadata, &index, "gear", false), SearchOutcome::NoMatches);
        assert_eq!(search.search(&metadata, &index, "MASTER", false), SearchOutcome::NoMatches);

        // 被排除的元素不随文档匹配一起列出
        let found = results(search.search(&metadata, &index, "drivetrain", false));
        assert_eq!(found.documents.len(), 1);
        let names: Vec<&str> = found.documents[0]
            .elements
            .iter()
            .map(|element| element.name.as_str())
            .collect();
        assert_eq!(names, vec!["Wheels"]);

        let all = results(search.search(&metadata, &index, "", true));
        assert!(all.document("dm").is_none());
        assert_eq!(all.element_count(), 1);
    }

    #[test]
    fn empty_query_hides_or_lists_all() {
        let mut search = SearchIndex::default();
        assert_eq!(search.search(&metadata(), &index(), "   ", false), SearchOutcome::Hidden);
        let all = results(search.search(&metadata(), &index(), "", true));
        assert_eq!(all.documents.len(), 2);
        assert_eq!(all.feature_count(), 4);
    }

    #[test]
    fn nodes_resolve_to_entity_unions() {
        let metadata = metadata();
        let index = index();
        let mut search = SearchIndex::default();
        search.search(&metadata, &index, "robot", false);

        let doc = search.entities_for_node(&index, &SearchNode::Document(DocumentId::new("d1")));
        assert_eq!(doc.len(), 3);
        let element = search.entities_for_node(&index, &SearchNode::Element(ElementKey::new("d1", "e1")));
        assert_eq!(element.len(), 2);
        let feature =
            search.entities_for_node(&index, &SearchNode::Feature(FeatureKey::new("d1", "e1", "f2")));
        assert!(feature.contains("B") && feature.len() == 1);
        let unknown =
            search.entities_for_node(&index, &SearchNode::Feature(FeatureKey::new("dx", "ex", "fx")));
        assert!(unknown.is_empty());
    }
}
