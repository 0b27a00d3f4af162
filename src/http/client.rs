use std::collections::HashMap;
use std::error::Error as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::http::cancel::CancelToken;
use crate::http::request::Request;
use crate::http::response::{ResponseRecord, TransportError, TransportErrorKind};
use crate::http::types::Status;
use crate::parser::merge::EffectiveRequest;

/// 传输层配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `None` 表示不限时
    pub timeout: Option<Duration>,
    /// 结构化 body 自动补充 `content-type: application/json`
    pub auto_content_type: bool,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            auto_content_type: true,
            user_agent: None,
        }
    }
}

/// 每种 (follow, verify_ssl) 组合复用一个底层客户端
type ClientKey = (bool, bool);

pub struct Client {
    config: ClientConfig,
    inner: Mutex<HashMap<ClientKey, reqwest::Client>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn client_for(&self, follow: bool, verify_ssl: bool) -> Result<reqwest::Client, TransportError> {
        let mut clients = self
            .inner
            .lock()
            .map_err(|_| TransportError::new(TransportErrorKind::Other, "client cache poisoned"))?;

        if let Some(client) = clients.get(&(follow, verify_ssl)) {
            return Ok(client.clone());
        }

        let redirect = if follow {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let mut builder = reqwest::Client::builder()
            .redirect(redirect)
            .danger_accept_invalid_certs(!verify_ssl);
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(agent) = &self.config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }

        let client = builder.build().map_err(|e| {
            TransportError::new(
                TransportErrorKind::Other,
                format!("failed to build HTTP client: {}", e),
            )
        })?;
        clients.insert((follow, verify_ssl), client.clone());
        Ok(client)
    }

    /// 执行已替换变量的请求
    ///
    /// 任何失败都以 `ResponseRecord::failed` 返回，取消时丢弃进行中的调用。
    pub async fn execute(&self, effective: &EffectiveRequest, cancel: &CancelToken) -> ResponseRecord {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return ResponseRecord::failed(TransportError::cancelled(), start.elapsed());
        }

        let request = match Request::from_effective(effective, self.config.auto_content_type) {
            Ok(request) => request,
            Err(e) => return ResponseRecord::failed(e, start.elapsed()),
        };

        tracing::debug!(method = %request.method, url = %request.url, "Sending request");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(request = %effective.name, "Request cancelled");
                ResponseRecord::failed(TransportError::cancelled(), start.elapsed())
            }
            result = self.send(request) => match result {
                Ok(record) => record,
                Err(e) => ResponseRecord::failed(e, start.elapsed()),
            },
        }
    }

    async fn send(&self, request: Request) -> Result<ResponseRecord, TransportError> {
        let client = self.client_for(request.follow_redirects, request.verify_ssl)?;
        let mut builder = client
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(classify)?;

        let status = Status::new(response.status().as_u16()).map_err(|e| {
            TransportError::new(TransportErrorKind::Other, e.to_string())
        })?;
        let version = format!("{:?}", response.version());
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(classify)?;

        Ok(ResponseRecord::new(status, headers, body, start.elapsed()).with_version(&version))
    }
}

/// 将 reqwest 错误归类为传输失败类型
fn classify(err: reqwest::Error) -> TransportError {
    let detail = error_chain(&err);
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if is_tls_failure(&detail) {
        TransportErrorKind::Tls
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_builder() {
        TransportErrorKind::InvalidRequest
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, detail)
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn is_tls_failure(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}
