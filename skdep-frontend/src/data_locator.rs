use std::env;
use std::path::{Path, PathBuf};

use skdep_config::AppConfig;
use tracing::{debug, trace};

const DATA_ROOTS_ENV: &str = "SKDEP_DATA_ROOTS";

/// 负载文件查找器：基准目录、配置中的数据根目录、环境变量 `SKDEP_DATA_ROOTS`，依次查找。
pub struct DataLocator {
    search_roots: Vec<PathBuf>,
}

impl DataLocator {
    pub fn from_config(base_dir: Option<&Path>, config: &AppConfig) -> Self {
        let mut roots: Vec<PathBuf> = Vec::new();

        if let Some(dir) = base_dir {
            roots.push(dir.to_path_buf());
        }

        roots.extend(
            config
                .data
                .data_roots
                .iter()
                .map(|root| match base_dir {
                    Some(dir) if root.is_relative() => dir.join(root),
                    _ => root.clone(),
                })
                .filter(|path| path.is_dir()),
        );

        if let Some(env_paths) = env::var_os(DATA_ROOTS_ENV) {
            for path in env::split_paths(&env_paths) {
                if path.is_dir() {
                    roots.push(path);
                }
            }
        }

        // 去重，保持靠前优先级。
        let mut deduped: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !deduped.iter().any(|existing| existing == &root) {
                deduped.push(root);
            }
        }
        debug!(roots = deduped.len(), "数据根目录已就绪");

        DataLocator {
            search_roots: deduped,
        }
    }

    #[inline]
    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            if path.is_file() {
                return Some(path.to_path_buf());
            }
            debug!(path = %path.display(), "负载路径为绝对路径但未找到对应文件");
            return None;
        }

        self.search_roots.iter().find_map(|root| {
            let candidate = root.join(path);
            trace!(candidate = %candidate.display(), "data locator candidate");
            candidate.is_file().then_some(candidate)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn relative_paths_search_roots_in_order() {
        let base = tempfile::tempdir().expect("创建临时目录失败");
        fs::create_dir(base.path().join("payloads")).expect("创建子目录失败");
        fs::write(base.path().join("payloads").join("robot.json"), "[]").expect("写入文件失败");

        let mut config = AppConfig::default();
        config.data.data_roots = vec![
            PathBuf::from("payloads"),
            PathBuf::from("payloads"),
            PathBuf::from("missing"),
        ];
        let locator = DataLocator::from_config(Some(base.path()), &config);
        assert!(locator.search_roots().len() >= 2);
        assert_eq!(locator.search_roots()[0], base.path());
        assert_eq!(
            locator
                .search_roots()
                .iter()
                .filter(|root| root.ends_with("payloads"))
                .count(),
            1
        );

        let resolved = locator
            .resolve(Path::new("robot.json"))
            .expect("应在数据根目录中找到文件");
        assert!(resolved.ends_with("payloads/robot.json"));
        assert!(locator.resolve(Path::new("absent.json")).is_none());
    }

    #[test]
    fn absolute_paths_must_exist() {
        let base = tempfile::tempdir().expect("创建临时目录失败");
        let file = base.path().join("data.json");
        fs::write(&file, "[]").expect("写入文件失败");

        let locator = DataLocator::from_config(None, &AppConfig::default());
        assert_eq!(locator.resolve(&file), Some(file.clone()));
        assert!(locator.resolve(&base.path().join("nope.json")).is_none());
    }
}
