use restbundle::http::{CancelToken, Client};
use restbundle::parser::{merge_request, parse_content};
use restbundle::variable::VariableStore;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUNDLE: &str = r#"
common:
  baseUrl: https://api.example.com/
  headers:
    X-A: "1"
    Accept: application/json
  params:
    - name: lang
      value: en
    - name: page
      value: 1
requests:
  search:
    method: GET
    url: /search
    headers:
      x-a: "2"
    params:
      - name: q
        value: a b
      - name: tag
        value: x&y
      - name: tag
        value: z
      - name: page
        value: 3
  raw:
    method: GET
    url: /search
    params:
      - name: q
        value: a b
        encode: false
      - name: path
        value: /tmp
  all_raw:
    method: GET
    url: https://other.example.com/list?fixed=1
    options:
      rawParams: true
    params:
      - name: q
        value: a b
"#;

#[test]
fn test_common_and_request_params_merge() {
    let bundle = parse_content(BUNDLE).unwrap();
    let effective = merge_request(bundle.common.as_ref(), bundle.request("search").unwrap()).unwrap();

    // page 被请求重新定义，common 中的同名项移除；重复的 tag 保留
    assert_eq!(
        effective.full_url(),
        "https://api.example.com/search?lang=en&q=a%20b&tag=x%26y&tag=z&page=3"
    );
    assert_eq!(effective.header("x-a"), Some(&json!("2")));
    assert_eq!(effective.header("X-A"), Some(&json!("2")));
    assert_eq!(effective.header("accept"), Some(&json!("application/json")));
    assert_eq!(effective.headers.iter().filter(|(k, _)| k == "x-a").count(), 1);
}

#[test]
fn test_encode_false_keeps_value_verbatim() {
    let bundle = parse_content(BUNDLE).unwrap();
    let effective = merge_request(bundle.common.as_ref(), bundle.request("raw").unwrap()).unwrap();

    assert_eq!(
        effective.full_url(),
        "https://api.example.com/search?lang=en&page=1&q=a b&path=%2Ftmp"
    );
}

#[test]
fn test_raw_params_option_and_existing_query() {
    let bundle = parse_content(BUNDLE).unwrap();
    let effective = merge_request(bundle.common.as_ref(), bundle.request("all_raw").unwrap()).unwrap();

    // 非 `/` 开头的 URL 原样使用，已有查询串时以 `&` 连接
    assert_eq!(
        effective.full_url(),
        "https://other.example.com/list?fixed=1&lang=en&page=1&q=a b"
    );
}

#[test]
fn test_param_values_resolved_before_encoding() {
    let bundle = parse_content(
        r#"
requests:
  find:
    method: GET
    url: http://localhost/find
    params:
      term: $term
      limit: $limit
"#,
    )
    .unwrap();
    let effective = merge_request(None, &bundle.requests[0]).unwrap();

    let mut store = VariableStore::new();
    store.insert("term", json!("rust lang"));
    store.insert("limit", json!(10));
    let (resolved, undefined) = effective.resolve(&store);

    assert!(undefined.is_empty());
    assert_eq!(resolved.full_url(), "http://localhost/find?term=rust%20lang&limit=10");
}

#[tokio::test]
async fn test_encoded_params_reach_server_decoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "a b"))
        .and(query_param("tag", "x&y"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let yaml = format!(
        r#"
requests:
  search:
    method: GET
    url: {}/search
    params:
      q: a b
      tag: x&y
"#,
        mock_server.uri()
    );
    let bundle = parse_content(&yaml).unwrap();
    let effective = merge_request(None, &bundle.requests[0]).unwrap();

    let response = Client::default()
        .execute(&effective, &CancelToken::new())
        .await;
    assert_eq!(response.status_code(), Some(200));
}
