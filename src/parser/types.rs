use serde_json::Value;
use std::path::PathBuf;

use crate::variable::capture::{CaptureSource, VariableCapture};
use crate::variable::types::EnvironmentSet;

/// 查询参数
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: Value,
    /// `encode: false` 时原样拼接
    pub encode: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            encode: true,
        }
    }

    pub fn raw(name: impl Into<String>, value: Value) -> Self {
        Self {
            encode: false,
            ..Self::new(name, value)
        }
    }
}

/// 请求选项，未设置的项在合并时回退到 common 或默认值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsSpec {
    pub follow: Option<bool>,
    pub verify_ssl: Option<bool>,
    pub show_headers: Option<bool>,
    pub keep_raw_json: Option<bool>,
    pub raw_params: Option<bool>,
    pub stop_on_failure: Option<bool>,
}

/// 断言定义，`json` 的键为 JSON 路径
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSpec {
    pub status: Option<Value>,
    pub body: Option<Value>,
    pub headers: Vec<(String, Value)>,
    pub json: Vec<(String, Value)>,
}

impl TestSpec {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.body.is_none() && self.headers.is_empty() && self.json.is_empty()
    }
}

/// 捕获定义，值均为目标变量名
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSpec {
    pub status: Option<String>,
    pub body: Option<String>,
    /// header 名 → 变量名
    pub headers: Vec<(String, String)>,
    /// JSON 路径 → 变量名
    pub json: Vec<(String, String)>,
    pub setvars: Vec<VariableCapture>,
}

impl CaptureSpec {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.body.is_none()
            && self.headers.is_empty()
            && self.json.is_empty()
            && self.setvars.is_empty()
    }

    /// 按执行顺序展开为捕获规则：status、body、headers、json、setvars
    pub fn rules(&self) -> Vec<VariableCapture> {
        let mut rules = Vec::new();
        if let Some(var) = &self.status {
            rules.push(VariableCapture::new(var.as_str(), CaptureSource::Status));
        }
        if let Some(var) = &self.body {
            rules.push(VariableCapture::new(var.as_str(), CaptureSource::Body));
        }
        for (header, var) in &self.headers {
            rules.push(VariableCapture::from_header(var.as_str(), header));
        }
        for (path, var) in &self.json {
            rules.push(VariableCapture::from_json(var.as_str(), path.as_str()));
        }
        rules.extend(self.setvars.iter().cloned());
        rules
    }
}

/// bundle 的 `common` 段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonSpec {
    pub base_url: Option<String>,
    pub method: Option<String>,
    pub headers: Vec<(String, Value)>,
    pub params: Vec<Param>,
    pub body: Option<Value>,
    pub options: OptionsSpec,
    pub tests: TestSpec,
    pub captures: CaptureSpec,
}

/// `requests` 中的单个请求
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSpec {
    pub name: String,
    pub method: Option<String>,
    pub url: Option<String>,
    pub headers: Vec<(String, Value)>,
    pub params: Vec<Param>,
    pub body: Option<Value>,
    pub options: OptionsSpec,
    pub tests: TestSpec,
    pub captures: CaptureSpec,
}

impl RequestSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// 解析后的 bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    pub common: Option<CommonSpec>,
    /// 保持声明顺序
    pub requests: Vec<RequestSpec>,
    pub variables: EnvironmentSet,
    pub source_path: Option<PathBuf>,
}

impl Bundle {
    pub fn with_source_path(mut self, path: PathBuf) -> Self {
        self.source_path = Some(path);
        self
    }

    pub fn request(&self, name: &str) -> Option<&RequestSpec> {
        self.requests.iter().find(|r| r.name == name)
    }

    pub fn request_names(&self) -> impl Iterator<Item = &str> {
        self.requests.iter().map(|r| r.name.as_str())
    }
}

/// bundle 解析错误
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 结构错误，`path` 为出错字段路径，如 `requests.login.params[1].name`
    #[error("{path}: {message}")]
    Schema { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No requests found in bundle")]
    NoRequests,
}

impl ParseError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
