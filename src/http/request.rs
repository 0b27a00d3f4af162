use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::http::response::{TransportError, TransportErrorKind};
use crate::http::types::Method;
use crate::parser::merge::EffectiveRequest;
use crate::utils::value::to_text;

/// 发往传输层的请求
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: url::Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub follow_redirects: bool,
    pub verify_ssl: bool,
}

fn invalid(message: String) -> TransportError {
    TransportError::new(TransportErrorKind::InvalidRequest, message)
}

impl Request {
    pub fn new(method: Method, url: &str) -> Result<Self, TransportError> {
        let url = url::Url::parse(url.trim())
            .map_err(|e| invalid(format!("invalid URL '{}': {}", url, e)))?;
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            follow_redirects: false,
            verify_ssl: true,
        })
    }

    fn insert_header(&mut self, key: &str, value: &str) -> Result<(), TransportError> {
        let name: HeaderName = key
            .parse()
            .map_err(|_| invalid(format!("invalid header name '{}'", key)))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| invalid(format!("invalid value for header '{}'", key)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// 结构化 body 序列化为 JSON，未显式指定时补充 content-type
    pub fn with_json(mut self, data: &Value, auto_content_type: bool) -> Result<Self, TransportError> {
        if auto_content_type && !self.headers.contains_key(CONTENT_TYPE) {
            self.insert_header("content-type", "application/json")?;
        }
        self.body = Some(data.to_string());
        Ok(self)
    }

    /// 从已替换变量的有效请求构建
    pub fn from_effective(
        effective: &EffectiveRequest,
        auto_content_type: bool,
    ) -> Result<Self, TransportError> {
        let method = Method::parse_or_get(Some(&effective.method));
        let mut request = Request::new(method, &effective.full_url())?;
        request.follow_redirects = effective.options.follow;
        request.verify_ssl = effective.options.verify_ssl;

        for (name, value) in &effective.headers {
            request.insert_header(name, &to_text(Some(value)))?;
        }

        request = match &effective.body {
            None | Some(Value::Null) => request,
            Some(Value::String(text)) => request.with_body(text.as_str()),
            Some(structured @ (Value::Object(_) | Value::Array(_))) => {
                request.with_json(structured, auto_content_type)?
            }
            Some(scalar) => request.with_body(to_text(Some(scalar))),
        };

        Ok(request)
    }
}
