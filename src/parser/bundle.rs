use crate::parser::types::{
    Bundle, CaptureSpec, CommonSpec, OptionsSpec, Param, ParseError, ParseResult, RequestSpec,
    TestSpec,
};
use crate::variable::capture::VariableCapture;
use crate::variable::types::EnvironmentSet;
use serde_json::{Map, Value};
use std::path::Path;

/// YAML bundle 解析器
///
/// 先解析为 `serde_json::Value`，再逐字段校验，错误带字段路径。
pub struct BundleParser;

impl BundleParser {
    /// 从文件路径解析
    pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Bundle> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let bundle = Self::parse_content(&content)?;
        Ok(bundle.with_source_path(path.as_ref().to_path_buf()))
    }

    /// 从字符串内容解析
    pub fn parse_content(content: &str) -> ParseResult<Bundle> {
        if content.trim().is_empty() {
            return Err(ParseError::NoRequests);
        }

        let document: Value = serde_yaml::from_str(content)?;
        let root = expect_object(&document, "<root>")?;

        let mut bundle = Bundle::default();
        for (key, value) in root {
            match key.as_str() {
                "common" => bundle.common = Some(parse_common(value, "common")?),
                "requests" => bundle.requests = parse_requests(value)?,
                "variables" => bundle.variables = parse_variables(value)?,
                other => tracing::warn!("Ignoring unknown top-level key '{}'", other),
            }
        }

        if bundle.requests.is_empty() {
            return Err(ParseError::NoRequests);
        }

        tracing::debug!(requests = bundle.requests.len(), "Bundle parsed");
        Ok(bundle)
    }
}

fn expect_object<'a>(value: &'a Value, path: &str) -> ParseResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ParseError::schema(path, format!("expected a map, found {}", kind(value))))
}

fn expect_string(value: &Value, path: &str) -> ParseResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParseError::schema(path, format!("expected a string, found {}", kind(value))))
}

fn expect_bool(value: &Value, path: &str) -> ParseResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| ParseError::schema(path, format!("expected a boolean, found {}", kind(value))))
}

fn kind(value: &Value) -> &'static str {
    crate::utils::value::type_name(Some(value))
}

fn parse_requests(value: &Value) -> ParseResult<Vec<RequestSpec>> {
    let map = expect_object(value, "requests")?;
    let mut requests = Vec::with_capacity(map.len());
    for (name, spec) in map {
        if name.trim().is_empty() {
            return Err(ParseError::schema("requests", "request name must not be empty"));
        }
        requests.push(parse_request(name, spec)?);
    }
    Ok(requests)
}

fn parse_request(name: &str, value: &Value) -> ParseResult<RequestSpec> {
    let path = format!("requests.{}", name);
    let map = expect_object(value, &path)?;
    let mut request = RequestSpec::new(name);

    for (key, field) in map {
        let field_path = format!("{}.{}", path, key);
        match key.as_str() {
            "method" => request.method = Some(expect_string(field, &field_path)?),
            "url" => request.url = Some(expect_string(field, &field_path)?),
            "headers" => request.headers = parse_headers(field, &field_path)?,
            "params" => request.params = parse_params(field, &field_path)?,
            "body" => request.body = Some(field.clone()),
            "options" => request.options = parse_options(field, &field_path)?,
            "tests" => request.tests = parse_tests(field, &field_path)?,
            "capture" => parse_capture(field, &field_path, &mut request.captures)?,
            "setvars" => request.captures.setvars = parse_setvars(field, &field_path)?,
            other => tracing::warn!("Ignoring unknown key '{}' in {}", other, path),
        }
    }
    Ok(request)
}

fn parse_common(value: &Value, path: &str) -> ParseResult<CommonSpec> {
    let map = expect_object(value, path)?;
    let mut common = CommonSpec::default();

    for (key, field) in map {
        let field_path = format!("{}.{}", path, key);
        match key.as_str() {
            "baseUrl" => common.base_url = Some(expect_string(field, &field_path)?),
            "method" => common.method = Some(expect_string(field, &field_path)?),
            "headers" => common.headers = parse_headers(field, &field_path)?,
            "params" => common.params = parse_params(field, &field_path)?,
            "body" => common.body = Some(field.clone()),
            "options" => common.options = parse_options(field, &field_path)?,
            "tests" => common.tests = parse_tests(field, &field_path)?,
            "capture" => parse_capture(field, &field_path, &mut common.captures)?,
            "setvars" => common.captures.setvars = parse_setvars(field, &field_path)?,
            other => tracing::warn!("Ignoring unknown key '{}' in {}", other, path),
        }
    }
    Ok(common)
}

/// 解析 `{name, value}` 数组中的单项
fn parse_pair<'a>(item: &'a Value, path: &str) -> ParseResult<(String, &'a Value, &'a Map<String, Value>)> {
    let entry = expect_object(item, path)?;
    let name = entry
        .get("name")
        .ok_or_else(|| ParseError::schema(path, "missing 'name'"))
        .and_then(|n| expect_string(n, &format!("{}.name", path)))?;
    let value = entry
        .get("value")
        .ok_or_else(|| ParseError::schema(path, "missing 'value'"))?;
    Ok((name, value, entry))
}

/// headers 支持 `{name, value}` 数组或 `name: value` 映射，名称保持原样
fn parse_headers(value: &Value, path: &str) -> ParseResult<Vec<(String, Value)>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| -> ParseResult<(String, Value)> {
                let (name, value, _) = parse_pair(item, &format!("{}[{}]", path, i))?;
                Ok((name, value.clone()))
            })
            .collect(),
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => Err(ParseError::schema(
            path,
            format!("expected a list or a map, found {}", kind(other)),
        )),
    }
}

/// params 同 headers，数组项可带 `encode: false`；映射中的序列展开为重复参数
fn parse_params(value: &Value, path: &str) -> ParseResult<Vec<Param>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut params = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                let (name, value, entry) = parse_pair(item, &item_path)?;
                let encode = match entry.get("encode") {
                    Some(flag) => expect_bool(flag, &format!("{}.encode", item_path))?,
                    None => true,
                };
                params.push(Param {
                    name,
                    value: value.clone(),
                    encode,
                });
            }
            Ok(params)
        }
        Value::Object(map) => {
            let mut params = Vec::new();
            for (name, value) in map {
                match value {
                    Value::Array(values) => params.extend(
                        values.iter().map(|v| Param::new(name.as_str(), v.clone())),
                    ),
                    single => params.push(Param::new(name.as_str(), single.clone())),
                }
            }
            Ok(params)
        }
        other => Err(ParseError::schema(
            path,
            format!("expected a list or a map, found {}", kind(other)),
        )),
    }
}

fn parse_options(value: &Value, path: &str) -> ParseResult<OptionsSpec> {
    if value.is_null() {
        return Ok(OptionsSpec::default());
    }
    let map = expect_object(value, path)?;
    let mut options = OptionsSpec::default();

    for (key, field) in map {
        let flag = Some(expect_bool(field, &format!("{}.{}", path, key))?);
        match key.as_str() {
            "follow" => options.follow = flag,
            "verifySSL" => options.verify_ssl = flag,
            "showHeaders" => options.show_headers = flag,
            "keepRawJSON" => options.keep_raw_json = flag,
            "rawParams" => options.raw_params = flag,
            "stopOnFailure" => options.stop_on_failure = flag,
            other => tracing::warn!("Ignoring unknown option '{}' in {}", other, path),
        }
    }
    Ok(options)
}

fn is_json_key(key: &str) -> bool {
    key == "$" || key.starts_with("$.") || key.starts_with("$[")
}

/// tests 段，`$.`/`$` 开头的键归入 json，`$h.` 开头的键归入 headers
fn parse_tests(value: &Value, path: &str) -> ParseResult<TestSpec> {
    if value.is_null() {
        return Ok(TestSpec::default());
    }
    let map = expect_object(value, path)?;
    let mut tests = TestSpec::default();

    for (key, field) in map {
        let field_path = format!("{}.{}", path, key);
        match key.as_str() {
            "status" => tests.status = Some(field.clone()),
            "body" => tests.body = Some(field.clone()),
            "headers" => tests.headers.extend(parse_headers(field, &field_path)?),
            "json" => {
                let entries = expect_object(field, &field_path)?;
                tests
                    .json
                    .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            shorthand if shorthand.starts_with("$h.") => {
                let name = &shorthand[3..];
                if name.is_empty() {
                    return Err(ParseError::schema(field_path, "header name is empty"));
                }
                tests.headers.push((name.to_string(), field.clone()));
            }
            shorthand if is_json_key(shorthand) => {
                tests.json.push((shorthand.to_string(), field.clone()));
            }
            other => {
                return Err(ParseError::schema(
                    field_path,
                    format!(
                        "unknown test key '{}', expected status, body, headers, json, $.<path> or $h.<header>",
                        other
                    ),
                ));
            }
        }
    }
    Ok(tests)
}

/// 解析 `source → 变量名` 映射
fn parse_var_map(value: &Value, path: &str) -> ParseResult<Vec<(String, String)>> {
    expect_object(value, path)?
        .iter()
        .map(|(source, var)| -> ParseResult<(String, String)> {
            Ok((source.clone(), expect_string(var, &format!("{}.{}", path, source))?))
        })
        .collect()
}

fn parse_capture(value: &Value, path: &str, spec: &mut CaptureSpec) -> ParseResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let map = expect_object(value, path)?;

    for (key, field) in map {
        let field_path = format!("{}.{}", path, key);
        match key.as_str() {
            "status" => spec.status = Some(expect_string(field, &field_path)?),
            "body" => spec.body = Some(expect_string(field, &field_path)?),
            "headers" => spec.headers = parse_var_map(field, &field_path)?,
            "json" => spec.json = parse_var_map(field, &field_path)?,
            other => {
                return Err(ParseError::schema(
                    field_path,
                    format!("unknown capture key '{}', expected status, body, headers or json", other),
                ));
            }
        }
    }
    Ok(())
}

/// setvars: `变量名: 描述符`
fn parse_setvars(value: &Value, path: &str) -> ParseResult<Vec<VariableCapture>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let map = expect_object(value, path)?;
    let mut captures = Vec::with_capacity(map.len());

    for (var, descriptor) in map {
        let field_path = format!("{}.{}", path, var);
        let descriptor = expect_string(descriptor, &field_path)?;
        let capture = VariableCapture::parse(var, &descriptor)
            .map_err(|message| ParseError::schema(field_path, message))?;
        captures.push(capture);
    }
    Ok(captures)
}

fn parse_variables(value: &Value) -> ParseResult<EnvironmentSet> {
    if value.is_null() {
        return Ok(EnvironmentSet::new());
    }
    let envs = expect_object(value, "variables")?;
    let mut set = EnvironmentSet::new();

    for (env, vars) in envs {
        let vars = expect_object(vars, &format!("variables.{}", env))?;
        if vars.is_empty() {
            set.environments.entry(env.clone()).or_default();
        }
        for (name, value) in vars {
            set.insert(env.as_str(), name.as_str(), value.clone());
        }
    }
    Ok(set)
}
