use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("没有可加载的数据来源（已尝试: {attempted}），且已禁用内置示例")]
    NoDataSource { attempted: String },
}
