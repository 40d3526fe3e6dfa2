use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub picking: PickingConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `SKDEP_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("SKDEP_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 数据来源：本地负载文件与可选的 HTTP 端点。
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "DataConfig::default_prefer_local")]
    pub prefer_local: bool,
    #[serde(default = "DataConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub data_roots: Vec<PathBuf>,
}

impl DataConfig {
    fn default_prefer_local() -> bool {
        true
    }

    fn default_timeout_secs() -> u64 {
        10
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            local_path: None,
            endpoint: None,
            prefer_local: Self::default_prefer_local(),
            timeout_secs: Self::default_timeout_secs(),
            data_roots: Vec::new(),
        }
    }
}

/// 拾取容差（像素预算）与悬停/选中的放大倍率。
#[derive(Debug, Clone, Deserialize)]
pub struct PickingConfig {
    #[serde(default = "PickingConfig::default_hover_pixels")]
    pub hover_pixels: f64,
    #[serde(default = "PickingConfig::default_click_pixels")]
    pub click_pixels: f64,
    #[serde(default = "PickingConfig::default_point_pixels")]
    pub point_pixels: f64,
    #[serde(default = "PickingConfig::default_min_line_tolerance")]
    pub min_line_tolerance: f64,
    #[serde(default = "PickingConfig::default_min_point_tolerance")]
    pub min_point_tolerance: f64,
    #[serde(default = "PickingConfig::default_hover_line_factor")]
    pub hover_line_factor: f64,
    #[serde(default = "PickingConfig::default_hover_point_factor")]
    pub hover_point_factor: f64,
    #[serde(default = "PickingConfig::default_selected_line_factor")]
    pub selected_line_factor: f64,
    #[serde(default = "PickingConfig::default_selected_point_factor")]
    pub selected_point_factor: f64,
}

impl PickingConfig {
    fn default_hover_pixels() -> f64 {
        8.0
    }

    fn default_click_pixels() -> f64 {
        6.0
    }

    fn default_point_pixels() -> f64 {
        7.0
    }

    fn default_min_line_tolerance() -> f64 {
        0.05
    }

    fn default_min_point_tolerance() -> f64 {
        2.0
    }

    fn default_hover_line_factor() -> f64 {
        2.0
    }

    fn default_hover_point_factor() -> f64 {
        1.7
    }

    fn default_selected_line_factor() -> f64 {
        3.0
    }

    fn default_selected_point_factor() -> f64 {
        2.5
    }
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            hover_pixels: Self::default_hover_pixels(),
            click_pixels: Self::default_click_pixels(),
            point_pixels: Self::default_point_pixels(),
            min_line_tolerance: Self::default_min_line_tolerance(),
            min_point_tolerance: Self::default_min_point_tolerance(),
            hover_line_factor: Self::default_hover_line_factor(),
            hover_point_factor: Self::default_hover_point_factor(),
            selected_line_factor: Self::default_selected_line_factor(),
            selected_point_factor: Self::default_selected_point_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightConfig {
    /// 十六进制颜色，例如 `"#C0C0C0"`。
    #[serde(default = "HighlightConfig::default_dimmed_color")]
    pub dimmed_color: String,
    #[serde(default = "HighlightConfig::default_range_dim_opacity")]
    pub range_dim_opacity: f32,
    #[serde(default = "HighlightConfig::default_focus_dim_opacity")]
    pub focus_dim_opacity: f32,
    #[serde(default = "HighlightConfig::default_selection_overlay_width")]
    pub selection_overlay_width: f64,
    #[serde(default = "HighlightConfig::default_search_overlay_width")]
    pub search_overlay_width: f64,
}

impl HighlightConfig {
    fn default_dimmed_color() -> String {
        "#C0C0C0".to_string()
    }

    fn default_range_dim_opacity() -> f32 {
        0.85
    }

    fn default_focus_dim_opacity() -> f32 {
        0.3
    }

    fn default_selection_overlay_width() -> f64 {
        4.0
    }

    fn default_search_overlay_width() -> f64 {
        6.0
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            dimmed_color: Self::default_dimmed_color(),
            range_dim_opacity: Self::default_range_dim_opacity(),
            focus_dim_opacity: Self::default_focus_dim_opacity(),
            selection_overlay_width: Self::default_selection_overlay_width(),
            search_overlay_width: Self::default_search_overlay_width(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// 自由文本搜索中隐藏的名称，空字符串表示不排除任何条目。
    #[serde(default = "SearchConfig::default_excluded_label")]
    pub excluded_label: String,
    #[serde(default = "SearchConfig::default_link_base")]
    pub link_base: String,
}

impl SearchConfig {
    fn default_excluded_label() -> String {
        "Master Sketch".to_string()
    }

    fn default_link_base() -> String {
        "https://cad.onshape.com".to_string()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            excluded_label: Self::default_excluded_label(),
            link_base: Self::default_link_base(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.data.prefer_local);
        assert!(cfg.data.endpoint.is_none());
        assert_eq!(cfg.data.timeout_secs, 10);
        assert_eq!(cfg.picking.hover_pixels, 8.0);
        assert_eq!(cfg.picking.click_pixels, 6.0);
        assert_eq!(cfg.highlight.dimmed_color, "#C0C0C0");
        assert_eq!(cfg.search.excluded_label, "Master Sketch");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [data]
            local_path = "payloads/robot.json"
            endpoint = "http://127.0.0.1:5000/get_dependency"
            prefer_local = false
            data_roots = ["../fixtures", "../payloads"]

            [picking]
            hover_pixels = 12.0

            [search]
            excluded_label = ""
            "#
        )
        .expect("写入临时文件失败");

        let cfg = AppConfig::from_file(file.path()).expect("加载配置失败");
        assert_eq!(cfg.logging.level, "debug");
        assert!(!cfg.data.prefer_local);
        assert_eq!(
            cfg.data.endpoint.as_deref(),
            Some("http://127.0.0.1:5000/get_dependency")
        );
        assert_eq!(cfg.data.data_roots.len(), 2);
        assert_eq!(cfg.data.timeout_secs, 10);
        assert_eq!(cfg.picking.hover_pixels, 12.0);
        assert_eq!(cfg.picking.click_pixels, 6.0);
        assert!(cfg.search.excluded_label.is_empty());
        assert_eq!(cfg.search.link_base, "https://cad.onshape.com");
    }

    #[test]
    fn invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        writeln!(file, "[data\nprefer_local = maybe").expect("写入临时文件失败");
        let error = AppConfig::from_file(file.path()).expect_err("非法 TOML 应报错");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let error = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("缺失文件应报错");
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
