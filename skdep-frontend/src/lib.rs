pub mod cli;
pub mod data_locator;
pub mod errors;
pub mod loader;
pub mod options;

pub use cli::CliArgs;

use errors::FrontendError;
use skdep_config::AppConfig;
use tracing::info;

/// 启动 CLI 前端：加载数据、执行命令并演示拾取。
pub fn run_cli(config: &AppConfig, args: CliArgs) -> Result<(), FrontendError> {
    info!(commands = args.commands.len(), "启动 CLI 前端");
    cli::run(config, args)
}
