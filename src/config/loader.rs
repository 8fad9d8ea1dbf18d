//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 当前目录下的配置文件名
pub const LOCAL_CONFIG_FILE: &str = "uptime-vitals.toml";

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的 `${VAR}` 环境变量，缺失的变量视为错误
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            let value = std::env::var(var_name).map_err(|_| ConfigError::EnvVarError {
                var: var_name.to_string(),
            })?;
            result = result.replace(full_match, &value);
        }

        Ok(result)
    }

    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
    }
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::debug!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `uptime-vitals.toml`，否则使用
/// `<用户配置目录>/uptime-vitals/config.toml`。
pub fn get_default_config_path() -> PathBuf {
    let local = Path::new(LOCAL_CONFIG_FILE);
    if local.exists() {
        return local.to_path_buf();
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("uptime-vitals").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_CONFIG_TOML: &str = r#"
[worker]
sweep_interval_seconds = 30
request_timeout_seconds = 5
max_concurrent_checks = 4
user_agent = "UptimeNinja/1.0"

[database]
path = "/var/lib/uptime/app.db"

[logging]
level = "debug"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.worker.sweep_interval_seconds, 30);
        assert_eq!(config.worker.expiry_interval_seconds, 3600);
        assert_eq!(config.worker.max_concurrent_checks, 4);
        assert_eq!(config.worker.user_agent.as_deref(), Some("UptimeNinja/1.0"));
        assert_eq!(config.database.path, PathBuf::from("/var/lib/uptime/app.db"));
        assert_eq!(config.logging.level, "debug");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("UPTIME_TEST_DB_PATH", "/tmp/uptime-test.db");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string("[database]\npath = \"${UPTIME_TEST_DB_PATH}\"\n")
            .await
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/uptime-test.db"));

        env::remove_var("UPTIME_TEST_DB_PATH");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("UPTIME_TEST_MISSING_VAR");

        let loader = TomlConfigLoader::new(true);
        let result = loader
            .load_from_string("[worker]\nuser_agent = \"${UPTIME_TEST_MISSING_VAR}\"\n")
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("UPTIME_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[tokio::test]
    async fn test_validation_error_is_reported() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string("[worker]\nmax_concurrent_checks = 0\n")
            .await;
        assert!(result.unwrap_err().to_string().contains("并发"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG_TOML.as_bytes()).unwrap();

        let loader = TomlConfigLoader::default();
        let config = loader.load_from_file(file.path()).await.unwrap();
        assert_eq!(config.worker.sweep_interval_seconds, 30);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TomlConfigLoader::default();

        let result = loader.load_from_file(dir.path().join("absent.toml")).await;
        assert!(result.unwrap_err().to_string().contains("absent.toml"));
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        let text = path.to_string_lossy();
        assert!(text.ends_with("config.toml") || text.ends_with(LOCAL_CONFIG_FILE));
    }
}
