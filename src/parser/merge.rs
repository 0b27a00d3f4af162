//! common 与单个请求合并为有效请求
//!
//! 合并规则：
//! - headers 名称在各自层内先转小写，数组项后者覆盖前者，再由请求覆盖 common
//! - params 中请求重新定义的名称会移除 common 的同名项，其余按顺序保留（允许重复）
//! - tests / capture 的 `headers`、`json` 按键合并，`status`、`body` 请求优先
//! - method、body、各个 option 请求优先，否则回退到 common

use serde_json::Value;

use crate::parser::types::{CaptureSpec, CommonSpec, OptionsSpec, Param, RequestSpec, TestSpec};
use crate::utils::value::to_text;
use crate::variable::capture::VariableCapture;
use crate::variable::resolver::VariableResolver;
use crate::variable::types::VariableStore;

/// 合并校验错误，发生在任何网络调用之前
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("request '{request}' is missing required field '{field}'")]
    MissingField {
        request: String,
        field: &'static str,
    },
}

/// 合并后的选项，已填入默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub follow: bool,
    pub verify_ssl: bool,
    pub show_headers: bool,
    pub keep_raw_json: bool,
    /// 所有参数都不做百分号编码
    pub raw_params: bool,
    /// status 断言失败时跳过其余断言
    pub stop_on_failure: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            follow: false,
            verify_ssl: true,
            show_headers: false,
            keep_raw_json: false,
            raw_params: false,
            stop_on_failure: false,
        }
    }
}

impl RequestOptions {
    fn merge(common: Option<&OptionsSpec>, request: &OptionsSpec) -> Self {
        let defaults = Self::default();
        let pick = |get: fn(&OptionsSpec) -> Option<bool>, default: bool| {
            get(request)
                .or_else(|| common.and_then(get))
                .unwrap_or(default)
        };

        Self {
            follow: pick(|o| o.follow, defaults.follow),
            verify_ssl: pick(|o| o.verify_ssl, defaults.verify_ssl),
            show_headers: pick(|o| o.show_headers, defaults.show_headers),
            keep_raw_json: pick(|o| o.keep_raw_json, defaults.keep_raw_json),
            raw_params: pick(|o| o.raw_params, defaults.raw_params),
            stop_on_failure: pick(|o| o.stop_on_failure, defaults.stop_on_failure),
        }
    }
}

/// 有效请求
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRequest {
    pub name: String,
    pub method: String,
    pub base_url: Option<String>,
    pub url: String,
    /// 名称已小写
    pub headers: Vec<(String, Value)>,
    pub params: Vec<Param>,
    pub body: Option<Value>,
    pub options: RequestOptions,
    pub tests: TestSpec,
    pub captures: CaptureSpec,
}

/// 按键合并，`overlay` 覆盖 `base`，键首次出现的位置保持不变
fn merge_keyed<V: Clone>(
    base: &[(String, V)],
    overlay: &[(String, V)],
    lowercase: bool,
) -> Vec<(String, V)> {
    let mut merged: Vec<(String, V)> = Vec::with_capacity(base.len() + overlay.len());
    for (key, value) in base.iter().chain(overlay) {
        let key = if lowercase {
            key.to_ascii_lowercase()
        } else {
            key.clone()
        };
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value.clone(),
            None => merged.push((key, value.clone())),
        }
    }
    merged
}

/// common 中被请求重新定义的参数名整体让位，其余参数保持顺序
fn merge_params(common: &[Param], request: &[Param]) -> Vec<Param> {
    common
        .iter()
        .filter(|c| !request.iter().any(|r| r.name == c.name))
        .chain(request)
        .cloned()
        .collect()
}

fn merge_tests(common: Option<&TestSpec>, request: &TestSpec) -> TestSpec {
    let empty = TestSpec::default();
    let common = common.unwrap_or(&empty);

    TestSpec {
        status: request.status.clone().or_else(|| common.status.clone()),
        body: request.body.clone().or_else(|| common.body.clone()),
        headers: merge_keyed(&common.headers, &request.headers, true),
        json: merge_keyed(&common.json, &request.json, false),
    }
}

fn keyed_setvars(setvars: &[VariableCapture]) -> Vec<(String, VariableCapture)> {
    setvars.iter().map(|c| (c.name.clone(), c.clone())).collect()
}

fn merge_captures(common: Option<&CaptureSpec>, request: &CaptureSpec) -> CaptureSpec {
    let empty = CaptureSpec::default();
    let common = common.unwrap_or(&empty);

    CaptureSpec {
        status: request.status.clone().or_else(|| common.status.clone()),
        body: request.body.clone().or_else(|| common.body.clone()),
        headers: merge_keyed(&common.headers, &request.headers, true),
        json: merge_keyed(&common.json, &request.json, false),
        setvars: merge_keyed(
            &keyed_setvars(&common.setvars),
            &keyed_setvars(&request.setvars),
            false,
        )
        .into_iter()
        .map(|(_, capture)| capture)
        .collect(),
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

/// 合并 common 与请求，缺少 url 或 method 时返回校验错误
pub fn merge_request(
    common: Option<&CommonSpec>,
    request: &RequestSpec,
) -> Result<EffectiveRequest, ValidationError> {
    let missing = |field| ValidationError::MissingField {
        request: request.name.clone(),
        field,
    };

    let method = non_empty(request.method.as_ref())
        .or_else(|| common.and_then(|c| non_empty(c.method.as_ref())))
        .ok_or_else(|| missing("method"))?;
    let url = non_empty(request.url.as_ref()).ok_or_else(|| missing("url"))?;

    let no_headers: &[(String, Value)] = &[];
    let no_params: &[Param] = &[];
    let effective = EffectiveRequest {
        name: request.name.clone(),
        method: method.trim().to_string(),
        base_url: common.and_then(|c| c.base_url.clone()),
        url: url.trim().to_string(),
        headers: merge_keyed(
            common.map_or(no_headers, |c| c.headers.as_slice()),
            &request.headers,
            true,
        ),
        params: merge_params(common.map_or(no_params, |c| c.params.as_slice()), &request.params),
        body: request
            .body
            .clone()
            .or_else(|| common.and_then(|c| c.body.clone())),
        options: RequestOptions::merge(common.map(|c| &c.options), &request.options),
        tests: merge_tests(common.map(|c| &c.tests), &request.tests),
        captures: merge_captures(common.map(|c| &c.captures), &request.captures),
    };

    tracing::debug!(
        request = %effective.name,
        headers = effective.headers.len(),
        params = effective.params.len(),
        "Request merged"
    );
    Ok(effective)
}

impl EffectiveRequest {
    /// 查询字符串，不含 `?`
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|param| {
                let value = to_text(Some(&param.value));
                if param.encode && !self.options.raw_params {
                    format!(
                        "{}={}",
                        urlencoding::encode(&param.name),
                        urlencoding::encode(&value)
                    )
                } else {
                    format!("{}={}", param.name, value)
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 组装完整 URL
    ///
    /// `/` 开头的相对路径拼接到 baseUrl 之后，否则原样使用
    pub fn full_url(&self) -> String {
        let mut url = match (&self.base_url, self.url.starts_with('/')) {
            (Some(base), true) => format!("{}{}", base.trim_end_matches('/'), self.url),
            _ => self.url.clone(),
        };

        let query = self.query_string();
        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }
        url
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// 替换请求中的变量，返回新请求和未定义的变量名
    ///
    /// 替换范围：method、baseUrl、url、header 值、参数值、body 以及断言期望值
    pub fn resolve(&self, store: &VariableStore) -> (EffectiveRequest, Vec<String>) {
        let mut resolver = VariableResolver::new(store);

        let resolved = EffectiveRequest {
            name: self.name.clone(),
            method: resolver.resolve_text(&self.method),
            base_url: self.base_url.as_deref().map(|b| resolver.resolve_text(b)),
            url: resolver.resolve_text(&self.url),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), resolver.resolve_value(value)))
                .collect(),
            params: self
                .params
                .iter()
                .map(|param| Param {
                    value: resolver.resolve_value(&param.value),
                    ..param.clone()
                })
                .collect(),
            body: self.body.as_ref().map(|b| resolver.resolve_value(b)),
            options: self.options,
            tests: TestSpec {
                status: self.tests.status.as_ref().map(|v| resolver.resolve_value(v)),
                body: self.tests.body.as_ref().map(|v| resolver.resolve_value(v)),
                headers: self
                    .tests
                    .headers
                    .iter()
                    .map(|(name, value)| (name.clone(), resolver.resolve_value(value)))
                    .collect(),
                json: self
                    .tests
                    .json
                    .iter()
                    .map(|(path, value)| (path.clone(), resolver.resolve_value(value)))
                    .collect(),
            },
            captures: self.captures.clone(),
        };

        (resolved, resolver.into_undefined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header(name: &str, value: Value) -> (String, Value) {
        (name.to_string(), value)
    }

    fn request(url: &str) -> RequestSpec {
        RequestSpec {
            method: Some("GET".to_string()),
            url: Some(url.to_string()),
            ..RequestSpec::new("req")
        }
    }

    #[test]
    fn test_header_case_merge() {
        let common = CommonSpec {
            headers: vec![header("X-A", json!(1))],
            ..CommonSpec::default()
        };
        let mut req = request("/get");
        req.headers = vec![header("x-a", json!(2))];

        let effective = merge_request(Some(&common), &req).unwrap();
        assert_eq!(effective.headers, vec![header("x-a", json!(2))]);
    }

    #[test]
    fn test_header_array_later_entry_wins() {
        let mut req = request("/get");
        req.headers = vec![
            header("Accept", json!("text/plain")),
            header("X-Trace", json!("1")),
            header("ACCEPT", json!("application/json")),
        ];

        let effective = merge_request(None, &req).unwrap();
        assert_eq!(
            effective.headers,
            vec![
                header("accept", json!("application/json")),
                header("x-trace", json!("1")),
            ]
        );
        assert_eq!(effective.header("Accept"), Some(&json!("application/json")));
    }

    #[test]
    fn test_query_encoding() {
        let mut req = request("http://h/p");
        req.params = vec![Param::raw("q", json!("a b"))];
        assert_eq!(merge_request(None, &req).unwrap().full_url(), "http://h/p?q=a b");

        req.params = vec![Param::new("q", json!("a b"))];
        assert_eq!(merge_request(None, &req).unwrap().full_url(), "http://h/p?q=a%20b");

        req.options.raw_params = Some(true);
        assert_eq!(merge_request(None, &req).unwrap().full_url(), "http://h/p?q=a b");
    }

    #[test]
    fn test_repeated_params_preserved() {
        let common = CommonSpec {
            params: vec![
                Param::new("tag", json!("common")),
                Param::new("lang", json!("en")),
            ],
            ..CommonSpec::default()
        };
        let mut req = request("http://h/s");
        req.params = vec![Param::new("tag", json!("a")), Param::new("tag", json!("b"))];

        let effective = merge_request(Some(&common), &req).unwrap();
        assert_eq!(effective.query_string(), "lang=en&tag=a&tag=b");
    }

    #[test]
    fn test_url_assembly() {
        let common = CommonSpec {
            base_url: Some("https://x/".to_string()),
            ..CommonSpec::default()
        };

        let mut req = request("/get");
        req.params = vec![Param::new("q", json!(1))];
        let effective = merge_request(Some(&common), &req).unwrap();
        assert_eq!(effective.full_url(), "https://x/get?q=1");

        let absolute = merge_request(Some(&common), &request("https://other/path?a=1")).unwrap();
        assert_eq!(absolute.full_url(), "https://other/path?a=1");

        let mut with_query = request("https://other/path?a=1");
        with_query.params = vec![Param::new("b", json!(true))];
        assert_eq!(
            merge_request(None, &with_query).unwrap().full_url(),
            "https://other/path?a=1&b=true"
        );

        assert_eq!(merge_request(None, &request("/rel")).unwrap().full_url(), "/rel");
    }

    #[test]
    fn test_missing_fields() {
        let mut req = request("/get");
        req.method = None;
        assert_eq!(
            merge_request(None, &req).unwrap_err(),
            ValidationError::MissingField {
                request: "req".to_string(),
                field: "method"
            }
        );

        let common = CommonSpec {
            method: Some("POST".to_string()),
            ..CommonSpec::default()
        };
        assert_eq!(merge_request(Some(&common), &req).unwrap().method, "POST");

        let mut no_url = request("");
        no_url.url = Some("  ".to_string());
        let err = merge_request(Some(&common), &no_url).unwrap_err();
        assert!(err.to_string().contains("'url'"));
    }

    #[test]
    fn test_options_merge_per_key() {
        let common = CommonSpec {
            options: OptionsSpec {
                follow: Some(true),
                verify_ssl: Some(false),
                ..OptionsSpec::default()
            },
            ..CommonSpec::default()
        };
        let mut req = request("/x");
        req.options.verify_ssl = Some(true);
        req.options.show_headers = Some(true);

        let options = merge_request(Some(&common), &req).unwrap().options;
        assert!(options.follow);
        assert!(options.verify_ssl);
        assert!(options.show_headers);
        assert!(!options.keep_raw_json);

        assert_eq!(
            merge_request(None, &request("/x")).unwrap().options,
            RequestOptions::default()
        );
    }

    #[test]
    fn test_tests_and_captures_merge() {
        let common = CommonSpec {
            body: Some(json!({"shared": true})),
            tests: TestSpec {
                status: Some(json!(200)),
                headers: vec![header("Content-Type", json!("application/json"))],
                json: vec![header("$.ok", json!(true)), header("$.v", json!(1))],
                ..TestSpec::default()
            },
            captures: CaptureSpec {
                status: Some("code".to_string()),
                headers: vec![("X-Id".to_string(), "id".to_string())],
                setvars: vec![
                    VariableCapture::from_json("token", "$.token"),
                    VariableCapture::from_json("user", "$.user"),
                ],
                ..CaptureSpec::default()
            },
            ..CommonSpec::default()
        };

        let mut req = request("/x");
        req.tests = TestSpec {
            status: Some(json!(201)),
            headers: vec![header("content-type", json!({"$regex": "json"}))],
            json: vec![header("$.v", json!(2))],
            ..TestSpec::default()
        };
        req.captures = CaptureSpec {
            headers: vec![("x-id".to_string(), "request_id".to_string())],
            setvars: vec![VariableCapture::from_header("token", "Authorization")],
            ..CaptureSpec::default()
        };

        let effective = merge_request(Some(&common), &req).unwrap();
        assert_eq!(effective.body, Some(json!({"shared": true})));

        let tests = &effective.tests;
        assert_eq!(tests.status, Some(json!(201)));
        assert_eq!(
            tests.headers,
            vec![header("content-type", json!({"$regex": "json"}))]
        );
        assert_eq!(
            tests.json,
            vec![header("$.ok", json!(true)), header("$.v", json!(2))]
        );

        let captures = &effective.captures;
        assert_eq!(captures.status.as_deref(), Some("code"));
        assert_eq!(
            captures.headers,
            vec![("x-id".to_string(), "request_id".to_string())]
        );
        assert_eq!(
            captures.setvars,
            vec![
                VariableCapture::from_header("token", "Authorization"),
                VariableCapture::from_json("user", "$.user"),
            ]
        );
    }

    #[test]
    fn test_resolve_keeps_native_types() {
        let mut store = VariableStore::new();
        store.insert("host", json!("api.local"));
        store.insert("code", json!(201));
        store.insert("payload", json!({"a": 1}));

        let mut req = request("http://$host/items");
        req.headers = vec![header("X-Host", json!("$(host)"))];
        req.params = vec![Param::new("id", json!("$missing"))];
        req.body = Some(json!("$payload"));
        req.tests.status = Some(json!("$code"));

        let effective = merge_request(None, &req).unwrap();
        let (resolved, undefined) = effective.resolve(&store);

        assert_eq!(resolved.url, "http://api.local/items");
        assert_eq!(resolved.header("x-host"), Some(&json!("api.local")));
        assert_eq!(resolved.body, Some(json!({"a": 1})));
        assert_eq!(resolved.tests.status, Some(json!(201)));
        assert_eq!(resolved.params[0].value, json!("$missing"));
        assert_eq!(undefined, vec!["missing".to_string()]);

        let (again, undefined_again) = resolved.resolve(&store);
        assert_eq!(again, resolved);
        assert_eq!(undefined_again, undefined);
    }
}
