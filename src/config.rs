use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::http::ClientConfig;

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `[http]` 段
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// 0 表示不限时
    pub timeout_secs: u64,
    pub auto_content_type: bool,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            auto_content_type: true,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            auto_content_type: self.auto_content_type,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// `[run]` 段
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// 默认环境名
    pub env: Option<String>,
    /// 外部变量文件，相对路径以配置文件所在目录为基准
    pub var_files: Vec<PathBuf>,
    pub progress_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            env: None,
            var_files: Vec::new(),
            progress_interval_ms: 1000,
        }
    }
}

impl RunConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

/// restbundle.toml
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub run: RunConfig,
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    const CONFIG_FILE: &'static str = "restbundle.toml";

    /// 从指定路径加载配置文件，`var_files` 转为相对配置文件目录的路径
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(dir) = path.parent() {
            for file in &mut config.run.var_files {
                if file.is_relative() {
                    *file = dir.join(&*file);
                }
            }
        }

        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/restbundle/
    ///
    /// 找不到时使用默认配置
    pub fn find_and_load() -> Result<AppConfig, ConfigError> {
        match Self::find() {
            Some(path) => Self::load_from_path(path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(AppConfig::default())
            }
        }
    }

    /// 显式路径优先，否则自动查找
    pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => Self::find_and_load(),
        }
    }

    fn find() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_from(&current).or_else(Self::user_config_path)
    }

    /// 从给定目录向上查找
    fn find_from(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(Self::CONFIG_FILE))
            .find(|path| path.is_file())
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        let path = home
            .join(".config")
            .join("restbundle")
            .join(Self::CONFIG_FILE);
        path.is_file().then_some(path)
    }
}
