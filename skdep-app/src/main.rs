use std::path::PathBuf;

use skdep_config::{AppConfig, ConfigError};
use skdep_frontend::CliArgs;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut cli_args = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--data" => {
                let Some(path) = args.next() else {
                    eprintln!("`--data` 需要提供负载文件路径");
                    std::process::exit(1);
                };
                cli_args.data = Some(PathBuf::from(path));
            }
            "--endpoint" => {
                let Some(url) = args.next() else {
                    eprintln!("`--endpoint` 需要提供 URL");
                    std::process::exit(1);
                };
                cli_args.endpoint = Some(url);
            }
            "--exec" => {
                let Some(command) = args.next() else {
                    eprintln!("`--exec` 需要提供命令文本");
                    std::process::exit(1);
                };
                cli_args.commands.push(command);
            }
            "--no-demo" => cli_args.no_demo = true,
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动草图依赖检查器");

    if let Err(err) = skdep_frontend::run_cli(&config, cli_args) {
        error!(error = %err, "执行 CLI 失败");
        std::process::exit(1);
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
