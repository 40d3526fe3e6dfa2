use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::DVec2;
use serde_json::{Map, Value};
use skdep_core::{
    geometry::Point2,
    model::{
        DependencyEdge, DocumentInfo, ElementInfo, FeatureInfo, MetadataTree, SketchData,
        SketchEntity, SketchGeometry, SketchPlane,
    },
};
use thiserror::Error;
use tracing::{debug, info};

const BT_POINT: &str = "BTMSketchPoint-158";
const BT_LINE: &str = "BTCurveGeometryLine-117";
const BT_CIRCLE: &str = "BTCurveGeometryCircle-115";
const BT_SPLINE: &str = "BTCurveGeometryInterpolatedSpline-116";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("invalid payload structure: {0}")]
    InvalidPayload(String),
}

/// 草图依赖数据的来源。
pub trait DataSource {
    /// 用于日志的简短描述。
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<SketchData, IoError>;
}

/// 本地 JSON 负载文件。
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for LocalFileSource {
    fn describe(&self) -> String {
        format!("本地文件 {}", self.path.display())
    }

    fn fetch(&self) -> Result<SketchData, IoError> {
        let text = fs::read_to_string(&self.path).map_err(|source| IoError::ReadError {
            path: self.path.clone(),
            source,
        })?;
        let data = parse_payload(&text)?;
        info!(
            path = %self.path.display(),
            entities = data.entities.len(),
            "已读取本地负载"
        );
        Ok(data)
    }
}

/// 以 GET 请求获取负载的 HTTP 端点。
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DataSource for HttpSource {
    fn describe(&self) -> String {
        format!("端点 {}", self.url)
    }

    fn fetch(&self) -> Result<SketchData, IoError> {
        let http_error = |err: ureq::Error| IoError::Http {
            url: self.url.clone(),
            message: err.to_string(),
        };
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);
        let mut response = agent
            .get(&self.url)
            .header("Accept", "application/json")
            .call()
            .map_err(http_error)?;
        let text = response.body_mut().read_to_string().map_err(http_error)?;
        let data = parse_payload(&text)?;
        info!(url = %self.url, entities = data.entities.len(), "已从端点获取负载");
        Ok(data)
    }
}

/// 解析 `[geometry, entities_dep, doc_info, ...]` 形式的负载；多余的尾部元素被忽略。
pub fn parse_payload(text: &str) -> Result<SketchData, IoError> {
    let root: Value = serde_json::from_str(text)?;
    payload_from_value(&root)
}

pub fn payload_from_value(root: &Value) -> Result<SketchData, IoError> {
    let items = root
        .as_array()
        .ok_or_else(|| IoError::InvalidPayload("顶层必须是数组".to_string()))?;
    let geometry = items.first().unwrap_or(&Value::Null);
    let dependencies = items.get(1).unwrap_or(&Value::Null);
    let doc_info = items.get(2).unwrap_or(&Value::Null);

    let sketches: Vec<&Map<String, Value>> = match geometry {
        Value::Null => Vec::new(),
        Value::Object(map) => vec![map],
        Value::Array(list) => list
            .iter()
            .enumerate()
            .filter_map(|(index, sketch)| {
                let map = sketch.as_object();
                if map.is_none() && !sketch.is_null() {
                    debug!(index, "跳过非对象的草图几何");
                }
                map
            })
            .collect(),
        _ => {
            return Err(IoError::InvalidPayload(
                "几何部分必须是对象或对象数组".to_string(),
            ));
        }
    };

    let dependencies = match dependencies {
        Value::Null => None,
        Value::Object(map) => Some(map),
        _ => {
            return Err(IoError::InvalidPayload(
                "entities_dep 必须是对象".to_string(),
            ));
        }
    };

    let mut entities = Vec::new();
    for (sketch_index, sketch) in sketches.into_iter().enumerate() {
        for (id, record) in sketch {
            let Some(record) = record.as_object() else {
                debug!(entity = %id, "跳过非对象的几何记录");
                continue;
            };
            let Some(mut entity) = parse_entity(id, record) else {
                continue;
            };
            entity.sketch_index = sketch_index;
            if let Some(edges) = dependencies.and_then(|map| map.get(id)) {
                entity.edges = parse_edges(id, edges);
            }
            entities.push(entity);
        }
    }

    let metadata = parse_metadata(doc_info);
    debug!(
        entities = entities.len(),
        documents = metadata.documents().count(),
        "负载解析完成"
    );
    Ok(SketchData::new(entities, metadata))
}

fn number(record: &Map<String, Value>, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

fn text(record: &Map<String, Value>, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_entity(id: &str, record: &Map<String, Value>) -> Option<SketchEntity> {
    let Some(bt_type) = record.get("btType").and_then(Value::as_str) else {
        debug!(entity = %id, "几何记录缺少 btType");
        return None;
    };

    let geometry = match bt_type {
        BT_POINT => SketchGeometry::Point {
            position: Point2::new(
                number(record, "x").unwrap_or(0.0),
                number(record, "y").unwrap_or(0.0),
            ),
        },
        BT_LINE => SketchGeometry::Line {
            origin: Point2::new(number(record, "pntX")?, number(record, "pntY")?),
            direction: DVec2::new(number(record, "dirX")?, number(record, "dirY")?),
        },
        BT_CIRCLE => {
            let x = number(record, "xCenter").or_else(|| number(record, "centerX"))?;
            let y = number(record, "yCenter").or_else(|| number(record, "centerY"))?;
            SketchGeometry::Circle {
                center: Point2::new(x, y),
                radius: number(record, "radius")?,
                clockwise: record
                    .get("clockwise")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }
        }
        BT_SPLINE => {
            let flat: Vec<f64> = record
                .get("interpolationPoints")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_default();
            if flat.len() < 4 {
                debug!(entity = %id, values = flat.len(), "样条插值点不足，跳过");
                return None;
            }
            let points = flat
                .chunks_exact(2)
                .map(|pair| Point2::new(pair[0], pair[1]))
                .collect();
            let handles = match (
                number(record, "startHandleX"),
                number(record, "startHandleY"),
                number(record, "endHandleX"),
                number(record, "endHandleY"),
            ) {
                (Some(sx), Some(sy), Some(ex), Some(ey)) => {
                    Some((Point2::new(sx, sy), Point2::new(ex, ey)))
                }
                _ => None,
            };
            SketchGeometry::Spline { points, handles }
        }
        other => {
            debug!(entity = %id, bt_type = other, "未知几何类型，跳过");
            return None;
        }
    };

    let mut entity = SketchEntity::new(id, geometry);
    entity.is_construction = record
        .get("isConstruction")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    entity.start_param = number(record, "startParam");
    entity.end_param = number(record, "endParam");
    entity.plane = text(record, "plane_side")
        .map(|label| SketchPlane::from_label(&label))
        .unwrap_or_default();
    entity.feature_id = text(record, "featureId").map(Into::into);
    Some(entity)
}

fn parse_edges(entity: &str, value: &Value) -> Vec<DependencyEdge> {
    let Some(list) = value.as_array() else {
        debug!(entity, "依赖列表不是数组");
        return Vec::new();
    };
    list.iter()
        .filter_map(|edge| {
            let Some(parts) = edge.as_array() else {
                debug!(entity, "跳过非数组的依赖边");
                return None;
            };
            let part = |index: usize| parts.get(index).and_then(Value::as_str).unwrap_or("");
            Some(DependencyEdge::new(part(0), part(1), part(2), part(3)))
        })
        .collect()
}

/// 元数据树的宽松解析：名称可以为 null，元素或特征条目也可能直接是名称字符串。
fn parse_metadata(value: &Value) -> MetadataTree {
    let mut tree = MetadataTree::new();
    let Some(documents) = value.as_object() else {
        return tree;
    };
    for (did, document) in documents {
        let Some(document) = document.as_object() else {
            debug!(document = %did, "跳过非对象的文档信息");
            continue;
        };
        let mut info = DocumentInfo {
            name: text(document, "name"),
            workspace: text(document, "wid").map(Into::into),
            ..DocumentInfo::default()
        };
        for (eid, element) in document
            .get("elements")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
        {
            info.elements.insert(eid.as_str().into(), parse_element(element));
        }
        tree.insert(did.as_str(), info);
    }
    tree
}

fn parse_element(value: &Value) -> ElementInfo {
    match value {
        Value::String(name) => ElementInfo::named(name.as_str()),
        Value::Object(element) => {
            let mut info = ElementInfo {
                name: text(element, "name"),
                ..ElementInfo::default()
            };
            for (fid, feature) in element
                .get("features")
                .and_then(Value::as_object)
                .into_iter()
                .flatten()
            {
                let feature = match feature {
                    Value::String(name) => FeatureInfo {
                        name: Some(name.clone()),
                        feature_type: None,
                    },
                    Value::Object(entry) => FeatureInfo {
                        name: text(entry, "name"),
                        feature_type: text(entry, "featureType"),
                    },
                    _ => FeatureInfo::default(),
                };
                info.features.insert(fid.as_str().into(), feature);
            }
            info
        }
        _ => ElementInfo::default(),
    }
}
