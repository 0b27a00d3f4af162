use crate::http::ResponseRecord;
use crate::parser::CaptureSpec;
use crate::utils::json_path;
use crate::variable::types::VariableStore;
use serde_json::Value;
use std::fmt;

/// 变量捕获来源
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// 响应状态码
    Status,

    /// 原始响应 Body
    Body,

    /// 响应 Header（名称已小写）
    Header(String),

    /// JSON 路径，示例: `$.token`, `$.items[0].id`
    Json(String),
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Status => write!(f, "status"),
            CaptureSource::Body => write!(f, "body"),
            CaptureSource::Header(name) => write!(f, "$h.{}", name),
            CaptureSource::Json(path) => write!(f, "{}", path),
        }
    }
}

/// 变量捕获配置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableCapture {
    /// 变量名称
    pub name: String,

    /// 捕获来源
    pub source: CaptureSource,
}

impl VariableCapture {
    pub fn new(name: impl Into<String>, source: CaptureSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// 从 JSON body 提取变量
    pub fn from_json(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, CaptureSource::Json(path.into()))
    }

    /// 从 Header 提取变量
    pub fn from_header(name: impl Into<String>, header_name: &str) -> Self {
        Self::new(name, CaptureSource::Header(header_name.to_ascii_lowercase()))
    }

    /// 解析 setvars 描述符
    ///
    /// 语法:
    /// - `status` / `body`
    /// - `$h.X-Token` → Header("x-token")
    /// - `$`、`$.user.id`、`$[0]` → JSON 路径
    pub fn parse(var_name: &str, descriptor: &str) -> Result<Self, String> {
        let descriptor = descriptor.trim();
        let source = if descriptor == "status" {
            CaptureSource::Status
        } else if descriptor == "body" {
            CaptureSource::Body
        } else if let Some(header) = descriptor.strip_prefix("$h.") {
            if header.is_empty() {
                return Err("header name is empty".to_string());
            }
            CaptureSource::Header(header.to_ascii_lowercase())
        } else if descriptor == "$" || descriptor.starts_with("$.") || descriptor.starts_with("$[")
        {
            CaptureSource::Json(descriptor.to_string())
        } else {
            return Err(format!(
                "unknown capture descriptor '{}', expected status, body, $h.<header> or a JSON path",
                descriptor
            ));
        };

        Ok(Self::new(var_name, source))
    }
}

/// 单个捕获失败，其余捕获继续执行
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("capture of '{variable}' from {origin} failed: {message}")]
pub struct CaptureError {
    pub variable: String,
    pub origin: CaptureSource,
    pub message: String,
}

impl CaptureError {
    fn new(capture: &VariableCapture, message: impl Into<String>) -> Self {
        Self {
            variable: capture.name.clone(),
            origin: capture.source.clone(),
            message: message.into(),
        }
    }
}

/// 从响应中提取单个捕获值
fn extract(capture: &VariableCapture, response: &ResponseRecord) -> Result<Value, CaptureError> {
    match &capture.source {
        CaptureSource::Status => response
            .status_code()
            .map(Value::from)
            .ok_or_else(|| CaptureError::new(capture, "response has no status")),
        CaptureSource::Body => Ok(Value::String(response.body.clone())),
        CaptureSource::Header(name) => response
            .header(name)
            .map(|v| Value::String(v.to_string()))
            .ok_or_else(|| CaptureError::new(capture, format!("header '{}' not found", name))),
        CaptureSource::Json(path) => {
            let json = response
                .json()
                .map_err(|e| CaptureError::new(capture, format!("body is not valid JSON: {}", e)))?;
            json_path::query(json, path)
                .map_err(|e| CaptureError::new(capture, e.to_string()))?
                .ok_or_else(|| CaptureError::new(capture, "JSON path matched nothing"))
        }
    }
}

/// 按顺序执行捕获，写入变量存储，返回失败列表
pub fn apply_captures(
    captures: &[VariableCapture],
    response: &ResponseRecord,
    store: &mut VariableStore,
) -> Vec<CaptureError> {
    let mut errors = Vec::new();

    for capture in captures {
        match extract(capture, response) {
            Ok(value) => {
                tracing::debug!(variable = %capture.name, source = %capture.source, "Captured variable");
                store.set_captured(capture.name.clone(), value);
            }
            Err(e) => {
                tracing::warn!("{}", e);
                errors.push(e);
            }
        }
    }

    errors
}

/// 执行请求合并后的全部捕获
pub fn run_captures(
    spec: &CaptureSpec,
    response: &ResponseRecord,
    store: &mut VariableStore,
) -> Vec<CaptureError> {
    apply_captures(&spec.rules(), response, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Status;
    use serde_json::json;
    use std::time::Duration;

    fn response(body: &str) -> ResponseRecord {
        ResponseRecord::new(
            Status::new(201).unwrap(),
            vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-token".to_string(), "abc".to_string()),
            ],
            body.to_string(),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_parse_descriptors() {
        assert_eq!(
            VariableCapture::parse("code", "status").unwrap().source,
            CaptureSource::Status
        );
        assert_eq!(
            VariableCapture::parse("raw", "body").unwrap().source,
            CaptureSource::Body
        );
        assert_eq!(
            VariableCapture::parse("tok", "$h.X-Token").unwrap().source,
            CaptureSource::Header("x-token".to_string())
        );
        assert_eq!(
            VariableCapture::parse("id", "$.user.id").unwrap().source,
            CaptureSource::Json("$.user.id".to_string())
        );
        assert!(VariableCapture::parse("bad", "user.id").is_err());
        assert!(VariableCapture::parse("bad", "$h.").is_err());
    }

    #[test]
    fn test_apply_all_sources() {
        let captures = vec![
            VariableCapture::new("code", CaptureSource::Status),
            VariableCapture::new("raw", CaptureSource::Body),
            VariableCapture::from_header("token", "X-Token"),
            VariableCapture::from_json("user", "$.user"),
        ];
        let response = response(r#"{"user": {"id": 9}}"#);
        let mut store = VariableStore::new();

        let errors = apply_captures(&captures, &response, &mut store);
        assert!(errors.is_empty());
        assert_eq!(store.resolve("code"), Some(&json!(201)));
        assert_eq!(store.resolve("raw"), Some(&json!(r#"{"user": {"id": 9}}"#)));
        assert_eq!(store.resolve("token"), Some(&json!("abc")));
        assert_eq!(store.resolve("user"), Some(&json!({"id": 9})));
    }

    #[test]
    fn test_failure_does_not_abort_others() {
        let captures = vec![
            VariableCapture::from_json("bad", "$.a[x]"),
            VariableCapture::from_json("missing", "$.nope"),
            VariableCapture::from_header("absent", "X-Absent"),
            VariableCapture::from_json("id", "$.id"),
        ];
        let response = response(r#"{"id": 3}"#);
        let mut store = VariableStore::new();

        let errors = apply_captures(&captures, &response, &mut store);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].variable, "bad");
        assert_eq!(store.resolve("bad"), None);
        assert_eq!(store.resolve("missing"), None);
        assert_eq!(store.resolve("id"), Some(&json!(3)));
    }

    #[test]
    fn test_invalid_json_body_only_fails_json_captures() {
        let captures = vec![
            VariableCapture::from_json("id", "$.id"),
            VariableCapture::new("raw", CaptureSource::Body),
        ];
        let response = response("not json");
        let mut store = VariableStore::new();

        let errors = apply_captures(&captures, &response, &mut store);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("not valid JSON"));
        assert_eq!(store.resolve("raw"), Some(&json!("not json")));
    }

    #[test]
    fn test_later_capture_overwrites_earlier() {
        let captures = vec![
            VariableCapture::from_json("v", "$.a"),
            VariableCapture::from_json("v", "$.b"),
        ];
        let response = response(r#"{"a": 1, "b": 2}"#);
        let mut store = VariableStore::new();

        apply_captures(&captures, &response, &mut store);
        assert_eq!(store.resolve("v"), Some(&json!(2)));
    }
}
