use crate::http::types::Status;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

/// 传输层失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// 用户取消
    Cancelled,
    Timeout,
    Connect,
    Tls,
    /// URL、header 等无法构造请求
    InvalidRequest,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Cancelled => "Cancelled by user",
            TransportErrorKind::Timeout => "Request timed out",
            TransportErrorKind::Connect => "Connection failed",
            TransportErrorKind::Tls => "TLS error",
            TransportErrorKind::InvalidRequest => "Invalid request",
            TransportErrorKind::Other => "Transport error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportErrorKind::Cancelled, "the request was aborted")
    }
}

/// 统一的响应记录
///
/// 传输失败时 `status` 为 `None`，`error` 记录原因，`body` 为可读描述。
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: Option<Status>,
    pub error: Option<TransportError>,
    /// 名称已小写，重复 header 以 ", " 合并
    pub headers: Vec<(String, String)>,
    /// 用于展示的原始 header 块
    pub raw_headers: String,
    pub body: String,
    pub duration: Duration,
    json: OnceLock<Result<Value, String>>,
}

impl ResponseRecord {
    pub fn new(
        status: Status,
        headers: Vec<(String, String)>,
        body: String,
        duration: Duration,
    ) -> Self {
        let mut merged: Vec<(String, String)> = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            let name = name.to_ascii_lowercase();
            match merged.iter_mut().find(|(n, _)| *n == name) {
                Some((_, existing)) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                None => merged.push((name, value)),
            }
        }

        let raw_headers = format_raw_headers("HTTP/1.1", status, &merged);
        Self {
            status: Some(status),
            error: None,
            headers: merged,
            raw_headers,
            body,
            duration,
            json: OnceLock::new(),
        }
    }

    /// 传输失败的响应记录
    pub fn failed(error: TransportError, duration: Duration) -> Self {
        Self {
            status: None,
            body: error.to_string(),
            error: Some(error),
            headers: Vec::new(),
            raw_headers: String::new(),
            duration,
            json: OnceLock::new(),
        }
    }

    /// 使用实际协议版本重建原始 header 块
    pub fn with_version(mut self, version: &str) -> Self {
        if let Some(status) = self.status {
            self.raw_headers = format_raw_headers(version, status, &self.headers);
        }
        self
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status.map(|s| s.code())
    }

    pub fn is_error(&self) -> bool {
        self.status.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.kind == TransportErrorKind::Cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| s.is_success())
    }

    /// 按名称查找 header，大小写不敏感
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 首次访问时解析 JSON body
    pub fn json(&self) -> Result<&Value, &str> {
        self.json
            .get_or_init(|| serde_json::from_str(&self.body).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(String::as_str)
    }
}

fn format_raw_headers(version: &str, status: Status, headers: &[(String, String)]) -> String {
    let mut out = format!("{} {}", version, status);
    for (name, value) in headers {
        out.push('\n');
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
    }
    out
}
