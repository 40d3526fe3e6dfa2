pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    const PARALLEL_EPSILON: f64 = 1e-12;

    /// 草图平面内的二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐三维包围盒，用于相机取景和点标记尺寸估算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds3 {
        min: DVec3,
        max: DVec3,
    }

    impl Bounds3 {
        #[inline]
        pub fn empty() -> Self {
            Self {
                min: DVec3::splat(f64::INFINITY),
                max: DVec3::splat(f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
        }

        #[inline]
        pub fn min(&self) -> DVec3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> DVec3 {
            self.max
        }

        pub fn include_point(&mut self, point: DVec3) {
            self.min = self.min.min(point);
            self.max = self.max.max(point);
        }

        pub fn include_bounds(&mut self, other: &Bounds3) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        pub fn center(&self) -> DVec3 {
            if self.is_empty() {
                DVec3::ZERO
            } else {
                (self.min + self.max) * 0.5
            }
        }

        /// 对角线长度；空包围盒返回 0。
        pub fn diagonal(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                (self.max - self.min).length()
            }
        }
    }

    /// 平面，满足 `normal · p + constant = 0`。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Plane {
        pub normal: DVec3,
        pub constant: f64,
    }

    impl Plane {
        pub fn from_normal_and_point(normal: DVec3, point: DVec3) -> Self {
            let normal = normal.normalize_or_zero();
            Self {
                normal,
                constant: -normal.dot(point),
            }
        }

        /// 平行于 XY、位于高度 `z` 的平面，即草图参考平面。
        #[inline]
        pub fn horizontal(z: f64) -> Self {
            Self {
                normal: DVec3::Z,
                constant: -z,
            }
        }

        #[inline]
        pub fn signed_distance(&self, point: DVec3) -> f64 {
            self.normal.dot(point) + self.constant
        }
    }

    /// 射线与线段最近点的求解结果。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SegmentProximity {
        pub distance_sq: f64,
        /// 射线上最近点对应的参数（沿方向的距离）。
        pub ray_t: f64,
        pub on_segment: DVec3,
    }

    /// 拾取射线，方向始终归一化。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Ray {
        origin: DVec3,
        direction: DVec3,
    }

    impl Ray {
        pub fn new(origin: DVec3, direction: DVec3) -> Self {
            Self {
                origin,
                direction: direction.normalize_or_zero(),
            }
        }

        #[inline]
        pub fn origin(&self) -> DVec3 {
            self.origin
        }

        #[inline]
        pub fn direction(&self) -> DVec3 {
            self.direction
        }

        #[inline]
        pub fn at(&self, t: f64) -> DVec3 {
            self.origin + self.direction * t
        }

        /// 沿射线到平面的距离；平行或平面在射线后方时返回 `None`。
        pub fn distance_to_plane(&self, plane: &Plane) -> Option<f64> {
            let denominator = plane.normal.dot(self.direction);
            if denominator.abs() < PARALLEL_EPSILON {
                return if plane.signed_distance(self.origin).abs() < PARALLEL_EPSILON {
                    Some(0.0)
                } else {
                    None
                };
            }
            let t = -(self.origin.dot(plane.normal) + plane.constant) / denominator;
            if t >= 0.0 { Some(t) } else { None }
        }

        /// 点到射线（而非直线）的距离平方，射线起点之后的部分才参与投影。
        pub fn distance_sq_to_point(&self, point: DVec3) -> f64 {
            let t = (point - self.origin).dot(self.direction).max(0.0);
            self.at(t).distance_squared(point)
        }

        #[inline]
        pub fn distance_to_point(&self, point: DVec3) -> f64 {
            self.distance_sq_to_point(point).sqrt()
        }

        /// 射线与线段 `[a, b]` 之间的最近点对。
        pub fn closest_to_segment(&self, a: DVec3, b: DVec3) -> SegmentProximity {
            let d1 = self.direction;
            let d2 = b - a;
            let r = self.origin - a;
            let e = d2.length_squared();
            let c = d1.dot(r);

            let (s, t) = if e <= PARALLEL_EPSILON {
                ((-c).max(0.0), 0.0)
            } else {
                let f = d2.dot(r);
                let b_dot = d1.dot(d2);
                let denom = e - b_dot * b_dot;
                let mut s = if denom > PARALLEL_EPSILON {
                    ((b_dot * f - c * e) / denom).max(0.0)
                } else {
                    0.0
                };
                let mut t = (b_dot * s + f) / e;
                if t < 0.0 {
                    t = 0.0;
                    s = (-c).max(0.0);
                } else if t > 1.0 {
                    t = 1.0;
                    s = (b_dot - c).max(0.0);
                }
                (s, t)
            };

            let on_ray = self.at(s);
            let on_segment = a + d2 * t;
            SegmentProximity {
                distance_sq: on_ray.distance_squared(on_segment),
                ray_t: s,
                on_segment,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn ray_hits_horizontal_plane() {
            let ray = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::new(0.0, 0.0, -2.0));
            let plane = Plane::horizontal(1.0);
            let distance = ray.distance_to_plane(&plane).expect("射线应与平面相交");
            assert!((distance - 9.0).abs() < 1e-12);

            let away = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::Z);
            assert!(away.distance_to_plane(&plane).is_none());

            let parallel = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::X);
            assert!(parallel.distance_to_plane(&plane).is_none());
        }

        #[test]
        fn point_behind_origin_measures_from_origin() {
            let ray = Ray::new(DVec3::ZERO, DVec3::X);
            assert!((ray.distance_to_point(DVec3::new(5.0, 2.0, 0.0)) - 2.0).abs() < 1e-12);
            assert!((ray.distance_to_point(DVec3::new(-3.0, 4.0, 0.0)) - 5.0).abs() < 1e-12);
        }

        #[test]
        fn segment_proximity_handles_crossing_and_endpoints() {
            let ray = Ray::new(DVec3::new(0.0, 0.0, 10.0), DVec3::NEG_Z);

            let crossing = ray.closest_to_segment(DVec3::new(-1.0, 0.5, 0.0), DVec3::new(1.0, 0.5, 0.0));
            assert!((crossing.distance_sq - 0.25).abs() < 1e-12);
            assert!((crossing.ray_t - 10.0).abs() < 1e-12);
            assert!(crossing.on_segment.x.abs() < 1e-12);

            let beside = ray.closest_to_segment(DVec3::new(2.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0));
            assert!((beside.distance_sq - 4.0).abs() < 1e-12);
            assert!((beside.on_segment.x - 2.0).abs() < 1e-12);

            let degenerate = ray.closest_to_segment(DVec3::new(0.0, 3.0, 0.0), DVec3::new(0.0, 3.0, 0.0));
            assert!((degenerate.distance_sq - 9.0).abs() < 1e-12);
        }

        #[test]
        fn bounds_track_points() {
            let mut bounds = Bounds3::empty();
            assert!(bounds.is_empty());
            assert_eq!(bounds.diagonal(), 0.0);
            bounds.include_point(DVec3::new(0.0, 0.0, 0.0));
            bounds.include_point(DVec3::new(3.0, 4.0, 0.0));
            assert!((bounds.diagonal() - 5.0).abs() < 1e-12);
            assert_eq!(bounds.center(), DVec3::new(1.5, 2.0, 0.0));
        }
    }
}

pub mod model {
    use std::borrow::Borrow;
    use std::collections::BTreeMap;
    use std::fmt;

    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    use crate::geometry::Point2;

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                #[inline]
                pub fn new(raw: impl Into<String>) -> Self {
                    Self(raw.into())
                }

                #[inline]
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl Borrow<str> for $name {
                fn borrow(&self) -> &str {
                    &self.0
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }
        };
    }

    string_id!(
        /// 草图实体 ID（Onshape entityId）。
        EntityId
    );
    string_id!(DocumentId);
    string_id!(WorkspaceId);
    string_id!(ElementId);
    string_id!(FeatureId);

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub enum GeometryKind {
        Point,
        Line,
        CircularArc,
        Spline,
    }

    impl GeometryKind {
        pub fn label(self) -> &'static str {
            match self {
                GeometryKind::Point => "point",
                GeometryKind::Line => "line",
                GeometryKind::CircularArc => "circularArc",
                GeometryKind::Spline => "spline",
            }
        }
    }

    /// 草图所在的基准平面。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum SketchPlane {
        #[default]
        Top,
        Front,
        Right,
    }

    impl SketchPlane {
        /// 解析 `plane_side` 字段，未知取值退化为 `Top`。
        pub fn from_label(label: &str) -> Self {
            match label {
                "front" => SketchPlane::Front,
                "right" => SketchPlane::Right,
                _ => SketchPlane::Top,
            }
        }

        /// 把草图局部坐标映射到世界坐标；顶视平面略微抬高到 `top_offset`。
        pub fn to_world(self, local: DVec2, top_offset: f64) -> DVec3 {
            match self {
                SketchPlane::Top => DVec3::new(local.x, local.y, top_offset),
                SketchPlane::Front => DVec3::new(local.x, 0.0, local.y),
                SketchPlane::Right => DVec3::new(0.0, local.x, local.y),
            }
        }
    }

    /// 草图几何记录（单位为英寸，渲染时再缩放）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum SketchGeometry {
        Point {
            position: Point2,
        },
        Line {
            origin: Point2,
            direction: DVec2,
        },
        Circle {
            center: Point2,
            radius: f64,
            clockwise: bool,
        },
        Spline {
            points: Vec<Point2>,
            handles: Option<(Point2, Point2)>,
        },
    }

    impl SketchGeometry {
        pub fn kind(&self) -> GeometryKind {
            match self {
                SketchGeometry::Point { .. } => GeometryKind::Point,
                SketchGeometry::Line { .. } => GeometryKind::Line,
                SketchGeometry::Circle { .. } => GeometryKind::CircularArc,
                SketchGeometry::Spline { .. } => GeometryKind::Spline,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ElementKey {
        pub document: DocumentId,
        pub element: ElementId,
    }

    impl ElementKey {
        pub fn new(document: impl Into<DocumentId>, element: impl Into<ElementId>) -> Self {
            Self {
                document: document.into(),
                element: element.into(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct FeatureKey {
        pub document: DocumentId,
        pub element: ElementId,
        pub feature: FeatureId,
    }

    impl FeatureKey {
        pub fn new(
            document: impl Into<DocumentId>,
            element: impl Into<ElementId>,
            feature: impl Into<FeatureId>,
        ) -> Self {
            Self {
                document: document.into(),
                element: element.into(),
                feature: feature.into(),
            }
        }

        pub fn element_key(&self) -> ElementKey {
            ElementKey {
                document: self.document.clone(),
                element: self.element.clone(),
            }
        }
    }

    /// 依赖边 `(documentId, workspaceId, elementId, featureId)`，各分量都可能缺失。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DependencyEdge {
        pub document: Option<DocumentId>,
        pub workspace: Option<WorkspaceId>,
        pub element: Option<ElementId>,
        pub feature: Option<FeatureId>,
    }

    impl DependencyEdge {
        pub fn new(document: &str, workspace: &str, element: &str, feature: &str) -> Self {
            fn part<T: From<String>>(raw: &str) -> Option<T> {
                if raw.is_empty() {
                    None
                } else {
                    Some(T::from(raw.to_string()))
                }
            }
            Self {
                document: part(document),
                workspace: part(workspace),
                element: part(element),
                feature: part(feature),
            }
        }

        /// 缺少文档或元素 ID 的边不可索引。
        pub fn element_key(&self) -> Option<ElementKey> {
            Some(ElementKey {
                document: self.document.clone()?,
                element: self.element.clone()?,
            })
        }

        pub fn feature_key(&self) -> Option<FeatureKey> {
            Some(FeatureKey {
                document: self.document.clone()?,
                element: self.element.clone()?,
                feature: self.feature.clone()?,
            })
        }
    }

    /// 加载后的草图实体，会话期间只读。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct SketchEntity {
        pub id: EntityId,
        pub sketch_index: usize,
        pub is_construction: bool,
        pub plane: SketchPlane,
        pub feature_id: Option<FeatureId>,
        pub start_param: Option<f64>,
        pub end_param: Option<f64>,
        pub geometry: SketchGeometry,
        pub edges: Vec<DependencyEdge>,
    }

    impl SketchEntity {
        pub fn new(id: impl Into<EntityId>, geometry: SketchGeometry) -> Self {
            Self {
                id: id.into(),
                sketch_index: 0,
                is_construction: false,
                plane: SketchPlane::Top,
                feature_id: None,
                start_param: None,
                end_param: None,
                geometry,
                edges: Vec::new(),
            }
        }

        pub fn with_params(mut self, start: f64, end: f64) -> Self {
            self.start_param = Some(start);
            self.end_param = Some(end);
            self
        }

        pub fn with_edges(mut self, edges: impl IntoIterator<Item = DependencyEdge>) -> Self {
            self.edges.extend(edges);
            self
        }

        #[inline]
        pub fn geometry_kind(&self) -> GeometryKind {
            self.geometry.kind()
        }

        /// 依赖计数即依赖边的数量。
        #[inline]
        pub fn dependency_count(&self) -> u32 {
            u32::try_from(self.edges.len()).unwrap_or(u32::MAX)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct FeatureInfo {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default, rename = "featureType")]
        pub feature_type: Option<String>,
    }

    impl FeatureInfo {
        pub fn new(name: impl Into<String>, feature_type: impl Into<String>) -> Self {
            Self {
                name: Some(name.into()),
                feature_type: Some(feature_type.into()),
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ElementInfo {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub features: BTreeMap<FeatureId, FeatureInfo>,
    }

    impl ElementInfo {
        pub fn named(name: impl Into<String>) -> Self {
            Self {
                name: Some(name.into()),
                features: BTreeMap::new(),
            }
        }

        pub fn with_feature(mut self, id: impl Into<FeatureId>, info: FeatureInfo) -> Self {
            self.features.insert(id.into(), info);
            self
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DocumentInfo {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default, rename = "wid")]
        pub workspace: Option<WorkspaceId>,
        #[serde(default)]
        pub elements: BTreeMap<ElementId, ElementInfo>,
    }

    impl DocumentInfo {
        pub fn named(name: impl Into<String>) -> Self {
            Self {
                name: Some(name.into()),
                ..Self::default()
            }
        }

        pub fn with_workspace(mut self, workspace: impl Into<WorkspaceId>) -> Self {
            self.workspace = Some(workspace.into());
            self
        }

        pub fn with_element(mut self, id: impl Into<ElementId>, info: ElementInfo) -> Self {
            self.elements.insert(id.into(), info);
            self
        }
    }

    /// 文档 → 元素 → 特征 的只读元数据树。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MetadataTree {
        documents: BTreeMap<DocumentId, DocumentInfo>,
    }

    impl MetadataTree {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, id: impl Into<DocumentId>, info: DocumentInfo) {
            self.documents.insert(id.into(), info);
        }

        pub fn with_document(mut self, id: impl Into<DocumentId>, info: DocumentInfo) -> Self {
            self.insert(id, info);
            self
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.documents.is_empty()
        }

        #[inline]
        pub fn documents(&self) -> impl Iterator<Item = (&DocumentId, &DocumentInfo)> {
            self.documents.iter()
        }

        #[inline]
        pub fn document(&self, id: &str) -> Option<&DocumentInfo> {
            self.documents.get(id)
        }

        pub fn element(&self, document: &str, element: &str) -> Option<&ElementInfo> {
            self.document(document)?.elements.get(element)
        }

        pub fn feature(&self, document: &str, element: &str, feature: &str) -> Option<&FeatureInfo> {
            self.element(document, element)?.features.get(feature)
        }

        /// 文档显示名，缺失时回退到 ID。
        pub fn document_name(&self, document: &str) -> String {
            self.document(document)
                .and_then(|info| info.name.clone())
                .unwrap_or_else(|| document.to_string())
        }

        pub fn element_name(&self, document: &str, element: &str) -> String {
            self.element(document, element)
                .and_then(|info| info.name.clone())
                .unwrap_or_else(|| element.to_string())
        }
    }

    /// 一次加载得到的完整数据集。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SketchData {
        pub entities: Vec<SketchEntity>,
        pub metadata: MetadataTree,
    }

    impl SketchData {
        pub fn new(entities: Vec<SketchEntity>, metadata: MetadataTree) -> Self {
            Self { entities, metadata }
        }

        pub fn entity(&self, id: &str) -> Option<&SketchEntity> {
            self.entities.iter().find(|entity| entity.id.as_str() == id)
        }

        /// 全局最小/最大依赖计数；无实体时返回 `None`。
        pub fn dependency_range(&self) -> Option<(u32, u32)> {
            let mut counts = self.entities.iter().map(SketchEntity::dependency_count);
            let first = counts.next()?;
            Some(counts.fold((first, first), |(lo, hi), count| {
                (lo.min(count), hi.max(count))
            }))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn line(id: &str, edges: usize) -> SketchEntity {
            let edge = DependencyEdge::new("doc", "ws", "el", "f");
            SketchEntity::new(
                id,
                SketchGeometry::Line {
                    origin: Point2::new(0.0, 0.0),
                    direction: DVec2::X,
                },
            )
            .with_edges(std::iter::repeat_n(edge, edges))
        }

        #[test]
        fn dependency_range_spans_all_entities() {
            let data = SketchData::new(vec![line("a", 2), line("b", 0), line("c", 7)], MetadataTree::new());
            assert_eq!(data.dependency_range(), Some((0, 7)));
            assert_eq!(SketchData::default().dependency_range(), None);
        }

        #[test]
        fn edges_without_document_or_element_have_no_keys() {
            let complete = DependencyEdge::new("d", "w", "e", "f");
            assert_eq!(complete.element_key(), Some(ElementKey::new("d", "e")));
            assert_eq!(complete.feature_key(), Some(FeatureKey::new("d", "e", "f")));

            let no_feature = DependencyEdge::new("d", "w", "e", "");
            assert!(no_feature.element_key().is_some());
            assert!(no_feature.feature_key().is_none());

            let no_element = DependencyEdge::new("d", "w", "", "f");
            assert!(no_element.element_key().is_none());
            assert!(no_element.feature_key().is_none());
        }

        #[test]
        fn metadata_names_fall_back_to_ids() {
            let tree = MetadataTree::new().with_document(
                "d1",
                DocumentInfo::named("Robot").with_element("e1", ElementInfo::default()),
            );
            assert_eq!(tree.document_name("d1"), "Robot");
            assert_eq!(tree.document_name("missing"), "missing");
            assert_eq!(tree.element_name("d1", "e1"), "e1");
            assert!(tree.feature("d1", "e1", "f1").is_none());
        }

        #[test]
        fn sketch_plane_maps_local_coordinates() {
            let local = DVec2::new(1.0, 2.0);
            assert_eq!(SketchPlane::Top.to_world(local, 0.5), DVec3::new(1.0, 2.0, 0.5));
            assert_eq!(SketchPlane::Front.to_world(local, 0.5), DVec3::new(1.0, 0.0, 2.0));
            assert_eq!(SketchPlane::Right.to_world(local, 0.5), DVec3::new(0.0, 1.0, 2.0));
            assert_eq!(SketchPlane::from_label("unknown"), SketchPlane::Top);
        }
    }
}

pub mod color {
    use serde::{Deserialize, Serialize};

    /// 8 位 RGB 颜色。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Rgb {
        pub r: u8,
        pub g: u8,
        pub b: u8,
    }

    /// 被过滤实体使用的中性灰。
    pub const NEUTRAL_GRAY: Rgb = Rgb::from_hex(0xC0C0C0);

    const TURBO_STOPS: [(f64, [f64; 3]); 6] = [
        (0.00, [30.0, 0.0, 70.0]),
        (0.20, [20.0, 110.0, 200.0]),
        (0.40, [0.0, 190.0, 140.0]),
        (0.60, [190.0, 210.0, 40.0]),
        (0.80, [255.0, 160.0, 10.0]),
        (1.00, [235.0, 0.0, 0.0]),
    ];

    impl Rgb {
        #[inline]
        pub const fn new(r: u8, g: u8, b: u8) -> Self {
            Self { r, g, b }
        }

        #[inline]
        pub const fn from_hex(hex: u32) -> Self {
            Self {
                r: ((hex >> 16) & 0xFF) as u8,
                g: ((hex >> 8) & 0xFF) as u8,
                b: (hex & 0xFF) as u8,
            }
        }

        #[inline]
        pub fn to_hex(self) -> u32 {
            (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
        }

        pub fn css(self) -> String {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        }

        fn from_channels(channels: [f64; 3]) -> Self {
            let quantize = |value: f64| value.round().clamp(0.0, 255.0) as u8;
            Self::new(
                quantize(channels[0]),
                quantize(channels[1]),
                quantize(channels[2]),
            )
        }
    }

    /// 图例渐变：`t ∈ [0, 1]` 映射到紫 → 蓝 → 青 → 黄绿 → 橙 → 红。
    pub fn turbo_gradient(t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mut index = 0;
        while index < TURBO_STOPS.len() - 1 && t > TURBO_STOPS[index + 1].0 {
            index += 1;
        }
        let (t0, c0) = TURBO_STOPS[index];
        let (t1, c1) = TURBO_STOPS[(index + 1).min(TURBO_STOPS.len() - 1)];
        let u = (t - t0) / (t1 - t0).max(1e-9);
        let lerp = |a: f64, b: f64| a + (b - a) * u;
        Rgb::from_channels([lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])])
    }

    /// 依赖计数在 `[min, max]` 上的颜色；跨度为 0 时分母取下限，不会除零。
    pub fn color_for_dependencies(value: f64, min: f64, max: f64) -> Rgb {
        let denominator = (max - min).max(1e-9);
        turbo_gradient((value - min) / denominator)
    }

}
