use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use skdep_config::AppConfig;
use skdep_core::model::SketchData;
use skdep_engine::demo::demo_data;
use skdep_io::{DataSource, HttpSource, LocalFileSource};
use tracing::{info, warn};

use crate::data_locator::DataLocator;
use crate::errors::FrontendError;

/// 数据来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq)]
pub enum DataOrigin {
    Endpoint(String),
    LocalFile(PathBuf),
    Demo,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Endpoint(url) => write!(f, "端点 {url}"),
            DataOrigin::LocalFile(path) => write!(f, "本地文件 {}", path.display()),
            DataOrigin::Demo => f.write_str("内置示例"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub local_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub prefer_local: bool,
    pub timeout: Duration,
    pub allow_demo: bool,
}

impl LoadRequest {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            local_path: config.data.local_path.clone(),
            endpoint: config.data.endpoint.clone(),
            prefer_local: config.data.prefer_local,
            timeout: Duration::from_secs(config.data.timeout_secs.max(1)),
            allow_demo: true,
        }
    }
}

/// 统一封装加载后的数据与来源。
#[derive(Debug)]
pub struct LoadedData {
    pub data: SketchData,
    pub origin: DataOrigin,
}

/// 依次尝试端点（未设置 `prefer_local` 时）、本地文件和内置示例。
pub fn load_data(request: &LoadRequest, locator: &DataLocator) -> Result<LoadedData, FrontendError> {
    let mut attempted: Vec<String> = Vec::new();

    if !request.prefer_local {
        if let Some(url) = &request.endpoint {
            let source = HttpSource::new(url.clone(), request.timeout);
            if let Some(data) = try_source(&source, &mut attempted) {
                return Ok(LoadedData {
                    data,
                    origin: DataOrigin::Endpoint(url.clone()),
                });
            }
        }
    }

    if let Some(path) = &request.local_path {
        match locator.resolve(path) {
            Some(resolved) => {
                let source = LocalFileSource::new(&resolved);
                if let Some(data) = try_source(&source, &mut attempted) {
                    return Ok(LoadedData {
                        data,
                        origin: DataOrigin::LocalFile(resolved),
                    });
                }
            }
            None => {
                warn!(path = %path.display(), "未在数据根目录中找到负载文件");
                attempted.push(format!("本地文件 {}", path.display()));
            }
        }
    }

    if request.allow_demo {
        info!("使用内置示例数据");
        return Ok(LoadedData {
            data: demo_data(),
            origin: DataOrigin::Demo,
        });
    }

    let attempted = if attempted.is_empty() {
        "无".to_string()
    } else {
        attempted.join(", ")
    };
    Err(FrontendError::NoDataSource { attempted })
}

fn try_source(source: &dyn DataSource, attempted: &mut Vec<String>) -> Option<SketchData> {
    let description = source.describe();
    match source.fetch() {
        Ok(data) => {
            info!(source = %description, entities = data.entities.len(), "数据加载成功");
            Some(data)
        }
        Err(err) => {
            warn!(source = %description, error = %err, "加载数据失败，尝试下一个来源");
            attempted.push(description);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const PAYLOAD: &str = r#"[
        { "L1": { "btType": "BTCurveGeometryLine-117", "pntX": 0, "pntY": 0,
                  "dirX": 1, "dirY": 0, "startParam": 0, "endParam": 1 } },
        { "L1": [["d", "w", "e", "f"]] },
        { "d": { "wid": "w", "name": "Doc", "elements": {} } }
    ]"#;

    fn request(local: Option<&str>) -> LoadRequest {
        LoadRequest {
            local_path: local.map(PathBuf::from),
            endpoint: None,
            prefer_local: true,
            timeout: Duration::from_secs(1),
            allow_demo: true,
        }
    }

    fn locator(base: &Path) -> DataLocator {
        DataLocator::from_config(Some(base), &AppConfig::default())
    }

    #[test]
    fn local_file_is_loaded_through_locator() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        fs::write(dir.path().join("payload.json"), PAYLOAD).expect("写入负载失败");

        let loaded = load_data(&request(Some("payload.json")), &locator(dir.path()))
            .expect("应能加载本地负载");
        assert!(matches!(loaded.origin, DataOrigin::LocalFile(ref path) if path.ends_with("payload.json")));
        assert_eq!(loaded.data.entities.len(), 1);
    }

    #[test]
    fn missing_or_broken_file_falls_back_to_demo() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let loaded = load_data(&request(Some("absent.json")), &locator(dir.path()))
            .expect("应回退到示例");
        assert_eq!(loaded.origin, DataOrigin::Demo);

        fs::write(dir.path().join("broken.json"), "[{").expect("写入负载失败");
        let loaded = load_data(&request(Some("broken.json")), &locator(dir.path()))
            .expect("应回退到示例");
        assert_eq!(loaded.origin, DataOrigin::Demo);
        assert!(!loaded.data.entities.is_empty());
    }

    #[test]
    fn unreachable_endpoint_falls_back_to_local_file() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        fs::write(dir.path().join("payload.json"), PAYLOAD).expect("写入负载失败");

        let mut request = request(Some("payload.json"));
        request.endpoint = Some("http://127.0.0.1:9/get_dependency".to_string());
        request.prefer_local = false;
        let loaded = load_data(&request, &locator(dir.path())).expect("应回退到本地文件");
        assert!(matches!(loaded.origin, DataOrigin::LocalFile(_)));
    }

    #[test]
    fn nothing_loadable_without_demo_is_an_error() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut request = request(Some("absent.json"));
        request.allow_demo = false;
        let error = load_data(&request, &locator(dir.path())).expect_err("应报告无数据来源");
        let FrontendError::NoDataSource { attempted } = error;
        assert!(attempted.contains("absent.json"));
    }
}
