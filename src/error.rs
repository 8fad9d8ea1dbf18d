//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Uptime Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum UptimeVitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 存储仓库相关错误
    #[error("存储错误: {0}")]
    Repository(#[from] RepositoryError),

    /// 探测器构建错误
    #[error("探测器错误: {0}")]
    Probe(#[from] ProbeError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 存储仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 记录不存在
    #[error("记录不存在")]
    NotFound,

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 存储数据无法解析
    #[error("数据格式错误: {0}")]
    Data(String),

    /// 其他后端错误（主要由内存实现和测试注入使用）
    #[error("存储后端错误: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// 是否表示"没有记录"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound | RepositoryError::Database(sqlx::Error::RowNotFound)
        )
    }
}

/// 探测器错误类型
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP客户端构建失败
    #[error("HTTP客户端构建失败: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// 探测参数无效
    #[error("探测参数无效: {0}")]
    InvalidSettings(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UptimeVitalsError>;

/// 存储仓库结果类型别名
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;
