use serde_json::Value;
use std::fmt;

use crate::utils::value::to_text;

/// 断言错误类型，求值时计为失败而不是中断
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertError {
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),

    #[error("type mismatch: cannot compare {actual} with {expected}")]
    TypeMismatch { expected: String, actual: String },

    #[error("$size expects an integer, got {0}")]
    InvalidSize(String),

    #[error("cannot take the size of {0}")]
    Unsized(String),

    #[error("$exists expects a boolean, got {0}")]
    InvalidExists(String),

    #[error("$type expects a type name string, got {0}")]
    InvalidTypeName(String),

    #[error("missing $regex pattern")]
    MissingPattern,

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("value is missing")]
    MissingValue,

    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid JSON path: {0}")]
    InvalidPath(String),
}

/// 断言目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Status,
    Body,
    /// 名称已小写
    Header(String),
    /// JSON 路径
    Json(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Status => write!(f, "status"),
            Target::Body => write!(f, "body"),
            Target::Header(name) => write!(f, "headers.{}", name),
            Target::Json(path) => write!(f, "json {}", path),
        }
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Size,
    Exists,
    Type,
    /// `$regex`，与 `$options` 一起求值
    Regex,
}

impl Operator {
    /// 从字符串解析运算符，`$options` 归入 `$regex`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "$eq" => Some(Self::Eq),
            "$ne" => Some(Self::Ne),
            "$lt" => Some(Self::Lt),
            "$gt" => Some(Self::Gt),
            "$lte" => Some(Self::Lte),
            "$gte" => Some(Self::Gte),
            "$size" => Some(Self::Size),
            "$exists" => Some(Self::Exists),
            "$type" => Some(Self::Type),
            "$regex" | "$options" => Some(Self::Regex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Lt => "$lt",
            Self::Gt => "$gt",
            Self::Lte => "$lte",
            Self::Gte => "$gte",
            Self::Size => "$size",
            Self::Exists => "$exists",
            Self::Type => "$type",
            Self::Regex => "$regex",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 单条断言结果
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub target: Target,

    /// 运算符原文，未知运算符也原样记录
    pub operator: String,

    pub expected: Value,

    /// 实际值，缺失时为 None
    pub received: Option<Value>,

    pub passed: bool,

    /// 失败消息
    pub message: Option<String>,
}

impl AssertionResult {
    /// 创建成功的断言结果
    pub fn success(target: Target, operator: &str, expected: Value, received: Option<Value>) -> Self {
        Self {
            target,
            operator: operator.to_string(),
            expected,
            received,
            passed: true,
            message: None,
        }
    }

    /// 创建失败的断言结果
    pub fn failure(
        target: Target,
        operator: &str,
        expected: Value,
        received: Option<Value>,
        message: String,
    ) -> Self {
        Self {
            target,
            operator: operator.to_string(),
            expected,
            received,
            passed: false,
            message: Some(message),
        }
    }

    /// 创建错误的断言结果（参数或响应无法求值）
    pub fn error(
        target: Target,
        operator: &str,
        expected: Value,
        received: Option<Value>,
        error: AssertError,
    ) -> Self {
        Self::failure(target, operator, expected, received, error.to_string())
    }

    /// 用于展示的单行描述
    pub fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.target,
            self.operator,
            to_text(Some(&self.expected))
        )
    }
}

/// 一个请求的全部断言结果与计数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionReport {
    pub results: Vec<AssertionResult>,
    pub total: usize,
    pub failed: usize,
}

impl AssertionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: AssertionResult) {
        self.total += 1;
        if !result.passed {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = AssertionResult>) {
        for result in results {
            self.push(result);
        }
    }

    pub fn passed(&self) -> usize {
        self.total - self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}
