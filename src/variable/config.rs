use crate::variable::types::EnvironmentSet;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 变量文件加载错误
#[derive(Debug, thiserror::Error)]
pub enum VariableFileError {
    #[error("Failed to read variable file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML variable file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse TOML variable file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// 变量文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableFileFormat {
    Yaml,
    Toml,
}

impl VariableFileFormat {
    /// 根据扩展名推断，`.toml` 以外一律按 YAML 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// 外部变量文件加载器
///
/// 文件内容为 `环境名 → 变量表`：
///
/// ```yaml
/// dev:
///   base_url: http://localhost:8080
///   token: ${DEV_TOKEN}
/// ```
pub struct VariableFileLoader;

impl VariableFileLoader {
    /// 从指定路径加载
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<EnvironmentSet, VariableFileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| VariableFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Loading variable file");
        Self::parse_content(&content, VariableFileFormat::from_path(path))
    }

    /// 按顺序加载多个文件
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<EnvironmentSet>, VariableFileError> {
        paths.iter().map(Self::load_from_path).collect()
    }

    /// 解析文件内容，字符串值中的 `${VAR}` 会替换为系统环境变量
    pub fn parse_content(
        content: &str,
        format: VariableFileFormat,
    ) -> Result<EnvironmentSet, VariableFileError> {
        // 空文件视为没有任何环境
        if content.trim().is_empty() {
            return Ok(EnvironmentSet::new());
        }

        let mut set: EnvironmentSet = match format {
            VariableFileFormat::Yaml => serde_yaml::from_str(content)?,
            VariableFileFormat::Toml => toml::from_str(content)?,
        };

        for env in set.environments.values_mut() {
            for value in env.variables.values_mut() {
                expand_in_value(value);
            }
        }
        Ok(set)
    }

    /// 解析 CLI 变量参数 "key=value"
    pub fn parse_cli_var(s: &str) -> Option<(String, String)> {
        s.split_once('=')
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
    }
}

fn expand_in_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = resolve_env_vars(s),
        Value::Array(items) => items.iter_mut().for_each(expand_in_value),
        Value::Object(map) => map.values_mut().for_each(expand_in_value),
        _ => {}
    }
}

/// 解析并替换系统环境变量 ${VAR}，未定义的保持原样
pub fn resolve_env_vars(text: &str) -> String {
    static ENV_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = ENV_REGEX
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
    else {
        return text.to_string();
    };

    re.replace_all(text, |caps: &Captures| {
        let env_name = &caps[1];
        std::env::var(env_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_yaml() {
        let content = r#"
dev:
  base_url: http://localhost:8080
  port: 8080
  debug: true
prod:
  base_url: https://api.example.com
"#;
        let set = VariableFileLoader::parse_content(content, VariableFileFormat::Yaml).unwrap();
        let dev = set.get_environment("dev").unwrap();
        assert_eq!(dev.variables.get("port"), Some(&json!(8080)));
        assert_eq!(dev.variables.get("debug"), Some(&json!(true)));
        assert!(set.get_environment("prod").is_some());
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
[dev]
base_url = "http://localhost:8080"
api_key = "dev-key"
"#;
        let set = VariableFileLoader::parse_content(content, VariableFileFormat::Toml).unwrap();
        let dev = set.get_environment("dev").unwrap();
        assert_eq!(dev.variables.get("api_key"), Some(&json!("dev-key")));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let mut temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        temp_file
            .write_all(b"[staging]\nhost = \"staging.example.com\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        let set = VariableFileLoader::load_from_path(temp_file.path()).unwrap();
        assert!(set.get_environment("staging").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let result = VariableFileLoader::load_from_path("/definitely/not/here.yaml");
        assert!(matches!(result, Err(VariableFileError::Read { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"dev: [unclosed").unwrap();
        temp_file.flush().unwrap();

        let result = VariableFileLoader::load_from_path(temp_file.path());
        assert!(matches!(result, Err(VariableFileError::Yaml(_))));
    }

    #[test]
    fn test_resolve_env_vars() {
        unsafe {
            std::env::set_var("RESTBUNDLE_TEST_VAR", "test_value");
        }

        assert_eq!(
            resolve_env_vars("Value: ${RESTBUNDLE_TEST_VAR}"),
            "Value: test_value"
        );
        assert_eq!(
            resolve_env_vars("Value: ${RESTBUNDLE_NONEXISTENT}"),
            "Value: ${RESTBUNDLE_NONEXISTENT}"
        );

        unsafe {
            std::env::remove_var("RESTBUNDLE_TEST_VAR");
        }
    }

    #[test]
    fn test_parse_cli_var() {
        assert_eq!(
            VariableFileLoader::parse_cli_var("key=value"),
            Some(("key".to_string(), "value".to_string()))
        );
        assert_eq!(
            VariableFileLoader::parse_cli_var("url=https://example.com?a=b"),
            Some(("url".to_string(), "https://example.com?a=b".to_string()))
        );
        assert_eq!(VariableFileLoader::parse_cli_var("invalid"), None);
    }
}
