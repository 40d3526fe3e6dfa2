use skdep_core::model::{
    DocumentId, ElementId, EntityId, FeatureId, FeatureKey, MetadataTree, SketchEntity, WorkspaceId,
};

pub const DEFAULT_LINK_BASE: &str = "https://cad.onshape.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
    pub id: FeatureId,
    pub name: String,
    pub feature_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementEntry {
    pub id: ElementId,
    pub name: String,
    pub features: Vec<FeatureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: DocumentId,
    pub workspace: Option<WorkspaceId>,
    pub name: String,
    pub elements: Vec<ElementEntry>,
}

impl DocumentEntry {
    /// 元素在外部 CAD 系统中的链接；缺少工作区 ID 时无法生成。
    pub fn element_link(&self, element: &ElementEntry, base: &str) -> Option<String> {
        let workspace = self.workspace.as_ref()?;
        Some(format!(
            "{}/documents/{}/w/{}/e/{}",
            base.trim_end_matches('/'),
            self.id,
            workspace,
            element.id
        ))
    }
}

/// 搜索索引的精确查找键，来自依赖菜单中选中的特征。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedFeature {
    pub key: FeatureKey,
    pub name: String,
}

impl PinnedFeature {
    pub fn new(key: FeatureKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
        }
    }

    /// 查询文本等于特征名称或特征 ID 时保持锁定。
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        query == self.name || query == self.key.feature.as_str()
    }
}

/// 单个实体的依赖明细：文档 → 元素 → 特征。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyBreakdown {
    pub entity: EntityId,
    pub documents: Vec<DocumentEntry>,
}

impl DependencyBreakdown {
    /// 按文档/元素分组实体的依赖边，名称缺失时回退到 ID。
    ///
    /// 分组中出现的文档会补齐元数据里列出的其余元素（不带特征），
    /// 这样菜单能展示整个文档。没有依赖边的实体得到空明细。
    pub fn for_entity(entity: &SketchEntity, metadata: &MetadataTree) -> Self {
        let mut documents: Vec<DocumentEntry> = Vec::new();

        for edge in &entity.edges {
            let (Some(document), Some(element)) = (edge.document.as_ref(), edge.element.as_ref())
            else {
                continue;
            };
            let doc_info = metadata.document(document.as_str());

            let doc_index = match documents.iter().position(|entry| &entry.id == document) {
                Some(index) => index,
                None => {
                    documents.push(DocumentEntry {
                        id: document.clone(),
                        workspace: doc_info
                            .and_then(|info| info.workspace.clone())
                            .or_else(|| edge.workspace.clone()),
                        name: metadata.document_name(document.as_str()),
                        elements: Vec::new(),
                    });
                    documents.len() - 1
                }
            };
            let doc_entry = &mut documents[doc_index];

            let el_index = match doc_entry.elements.iter().position(|entry| &entry.id == element) {
                Some(index) => index,
                None => {
                    doc_entry.elements.push(ElementEntry {
                        id: element.clone(),
                        name: metadata.element_name(document.as_str(), element.as_str()),
                        features: Vec::new(),
                    });
                    doc_entry.elements.len() - 1
                }
            };
            let el_entry = &mut doc_entry.elements[el_index];

            let Some(feature) = edge.feature.as_ref() else {
                continue;
            };
            if el_entry.features.iter().any(|entry| &entry.id == feature) {
                continue;
            }
            let info = metadata.feature(document.as_str(), element.as_str(), feature.as_str());
            el_entry.features.push(FeatureEntry {
                id: feature.clone(),
                name: info
                    .and_then(|info| info.name.clone())
                    .unwrap_or_else(|| feature.to_string()),
                feature_type: info
                    .and_then(|info| info.feature_type.clone())
                    .unwrap_or_default(),
            });
        }

        for doc_entry in &mut documents {
            let Some(info) = metadata.document(doc_entry.id.as_str()) else {
                continue;
            };
            for (element_id, element_info) in &info.elements {
                if doc_entry.elements.iter().any(|entry| &entry.id == element_id) {
                    continue;
                }
                doc_entry.elements.push(ElementEntry {
                    id: element_id.clone(),
                    name: element_info
                        .name
                        .clone()
                        .unwrap_or_else(|| element_id.to_string()),
                    features: Vec::new(),
                });
            }
        }

        Self {
            entity: entity.id.clone(),
            documents,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.documents
            .iter()
            .flat_map(|document| &document.elements)
            .map(|element| element.features.len())
            .sum()
    }

    /// 选中菜单中的特征，生成锁定查询。
    pub fn pin(&self, document: &str, element: &str, feature: &str) -> Option<PinnedFeature> {
        let doc = self.documents.iter().find(|d| d.id.as_str() == document)?;
        let el = doc.elements.iter().find(|e| e.id.as_str() == element)?;
        let feat = el.features.iter().find(|f| f.id.as_str() == feature)?;
        Some(PinnedFeature::new(
            FeatureKey::new(doc.id.clone(), el.id.clone(), feat.id.clone()),
            feat.name.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skdep_core::geometry::Point2;
    use skdep_core::model::{DependencyEdge, DocumentInfo, ElementInfo, FeatureInfo, SketchGeometry};

    fn metadata() -> MetadataTree {
        MetadataTree::new().with_document(
            "d1",
            DocumentInfo::named("Robot")
                .with_workspace("w-meta")
                .with_element(
                    "e1",
                    ElementInfo::named("Chassis")
                        .with_feature("f1", FeatureInfo::new("Extrude 1", "extrude")),
                )
                .with_element("e2", ElementInfo::named("Arm")),
        )
    }

    fn entity(edges: Vec<DependencyEdge>) -> SketchEntity {
        SketchEntity::new("x", SketchGeometry::Point { position: Point2::new(0.0, 0.0) }).with_edges(edges)
    }

    #[test]
    fn groups_edges_and_adds_sibling_elements() {
        let breakdown = DependencyBreakdown::for_entity(
            &entity(vec![
                DependencyEdge::new("d1", "w-edge", "e1", "f1"),
                DependencyEdge::new("d1", "w-edge", "e1", "f1"),
                DependencyEdge::new("d2", "w2", "e9", "f9"),
            ]),
            &metadata(),
        );
        assert_eq!(breakdown.documents.len(), 2);
        let robot = &breakdown.documents[0];
        assert_eq!(robot.name, "Robot");
        assert_eq!(robot.workspace, Some(WorkspaceId::new("w-meta")));
        assert_eq!(robot.elements.len(), 2);
        assert_eq!(robot.elements[0].features.len(), 1);
        assert_eq!(robot.elements[0].features[0].name, "Extrude 1");
        assert_eq!(robot.elements[1].name, "Arm");
        assert!(robot.elements[1].features.is_empty());

        let unknown = &breakdown.documents[1];
        assert_eq!(unknown.name, "d2");
        assert_eq!(unknown.elements[0].features[0].name, "f9");
        assert_eq!(unknown.elements[0].features[0].feature_type, "");
        assert_eq!(breakdown.feature_count(), 2);
    }

    #[test]
    fn links_require_a_workspace() {
        let breakdown = DependencyBreakdown::for_entity(
            &entity(vec![DependencyEdge::new("d1", "", "e1", "f1")]),
            &metadata(),
        );
        let doc = &breakdown.documents[0];
        assert_eq!(
            doc.element_link(&doc.elements[0], DEFAULT_LINK_BASE).as_deref(),
            Some("https://cad.onshape.com/documents/d1/w/w-meta/e/e1")
        );

        let bare = DependencyBreakdown::for_entity(
            &entity(vec![DependencyEdge::new("d3", "", "e1", "f1")]),
            &MetadataTree::new(),
        );
        let doc = &bare.documents[0];
        assert!(doc.element_link(&doc.elements[0], DEFAULT_LINK_BASE).is_none());
    }

    #[test]
    fn zero_edges_give_empty_breakdown() {
        let breakdown = DependencyBreakdown::for_entity(&entity(Vec::new()), &metadata());
        assert!(breakdown.is_empty());
        assert_eq!(breakdown.feature_count(), 0);
        assert!(breakdown.pin("d1", "e1", "f1").is_none());
    }

    #[test]
    fn pinning_uses_resolved_name() {
        let breakdown = DependencyBreakdown::for_entity(
            &entity(vec![DependencyEdge::new("d1", "w", "e1", "f1")]),
            &metadata(),
        );
        let pinned = breakdown.pin("d1", "e1", "f1").expect("特征应可锁定");
        assert_eq!(pinned.name, "Extrude 1");
        assert!(pinned.matches_query("Extrude 1"));
        assert!(pinned.matches_query("f1"));
        assert!(!pinned.matches_query("Extrude"));
    }
}
