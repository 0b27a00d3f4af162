use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::assertion::types::{AssertError, AssertionResult, Operator, Target};
use crate::utils::value::{to_text, type_name};

/// 对单个断言叶子求值
///
/// 非对象期望值按文本相等比较；对象期望值的每个键都是一个运算符，
/// `$regex` 与 `$options` 合并为一次求值。
pub fn evaluate_leaf(
    target: &Target,
    expected: &Value,
    received: Result<Option<Value>, AssertError>,
) -> Vec<AssertionResult> {
    let received = match received {
        Ok(value) => value,
        Err(e) => {
            return vec![AssertionResult::error(
                target.clone(),
                leaf_operator(expected),
                expected.clone(),
                None,
                e,
            )];
        }
    };

    match expected {
        Value::Object(ops) if !ops.is_empty() => evaluate_operators(target, ops, received.as_ref()),
        _ => vec![evaluate_operator(
            target,
            Operator::Eq,
            expected,
            received.as_ref(),
        )],
    }
}

/// 无法取得实际值时用于展示的运算符
fn leaf_operator(expected: &Value) -> &str {
    match expected {
        Value::Object(ops) => ops.keys().next().map_or("$eq", String::as_str),
        _ => "$eq",
    }
}

fn evaluate_operators(
    target: &Target,
    ops: &Map<String, Value>,
    received: Option<&Value>,
) -> Vec<AssertionResult> {
    let mut results = Vec::with_capacity(ops.len());
    let mut regex_done = false;

    for (key, expected) in ops {
        match Operator::parse(key) {
            Some(Operator::Regex) => {
                if regex_done {
                    continue;
                }
                regex_done = true;
                results.push(evaluate_regex(target, ops, received));
            }
            Some(op) => results.push(evaluate_operator(target, op, expected, received)),
            None => results.push(AssertionResult::error(
                target.clone(),
                key,
                expected.clone(),
                received.cloned(),
                AssertError::InvalidOperator(key.clone()),
            )),
        }
    }

    results
}

fn evaluate_operator(
    target: &Target,
    op: Operator,
    expected: &Value,
    received: Option<&Value>,
) -> AssertionResult {
    let outcome = match op {
        Operator::Eq => Ok(to_text(received) == to_text(Some(expected))),
        Operator::Ne => Ok(to_text(received) != to_text(Some(expected))),
        Operator::Lt => compare(received, expected).map(|o| o == Ordering::Less),
        Operator::Gt => compare(received, expected).map(|o| o == Ordering::Greater),
        Operator::Lte => compare(received, expected).map(|o| o != Ordering::Greater),
        Operator::Gte => compare(received, expected).map(|o| o != Ordering::Less),
        Operator::Size => check_size(received, expected),
        Operator::Exists => expected
            .as_bool()
            .map(|should_exist| received.is_some() == should_exist)
            .ok_or_else(|| AssertError::InvalidExists(to_text(Some(expected)))),
        Operator::Type => expected
            .as_str()
            .map(|name| name.eq_ignore_ascii_case(type_name(received)))
            .ok_or_else(|| AssertError::InvalidTypeName(to_text(Some(expected)))),
        // `$regex` 需要整个运算符对象，由 evaluate_regex 处理
        Operator::Regex => Err(AssertError::MissingPattern),
    };

    finish(target, op.as_str(), expected, received, outcome)
}

fn finish(
    target: &Target,
    operator: &str,
    expected: &Value,
    received: Option<&Value>,
    outcome: Result<bool, AssertError>,
) -> AssertionResult {
    match outcome {
        Ok(true) => AssertionResult::success(
            target.clone(),
            operator,
            expected.clone(),
            received.cloned(),
        ),
        Ok(false) => {
            let message = format!(
                "Expected {} {} {}, but got {}",
                target,
                operator,
                to_text(Some(expected)),
                to_text(received)
            );
            AssertionResult::failure(
                target.clone(),
                operator,
                expected.clone(),
                received.cloned(),
                message,
            )
        }
        Err(e) => AssertionResult::error(
            target.clone(),
            operator,
            expected.clone(),
            received.cloned(),
            e,
        ),
    }
}

/// 原生顺序比较，只支持数字与数字、字符串与字符串
fn compare(received: Option<&Value>, expected: &Value) -> Result<Ordering, AssertError> {
    let mismatch = || AssertError::TypeMismatch {
        expected: type_name(Some(expected)).to_string(),
        actual: type_name(received).to_string(),
    };

    match (received, expected) {
        (Some(Value::Number(a)), Value::Number(b)) => {
            let (a, b) = (a.as_f64().ok_or_else(mismatch)?, b.as_f64().ok_or_else(mismatch)?);
            a.partial_cmp(&b).ok_or_else(mismatch)
        }
        (Some(Value::String(a)), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch()),
    }
}

/// `$size` 参数必须是整数（或可解析为整数的字符串）
fn parse_size(expected: &Value) -> Option<usize> {
    match expected {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn check_size(received: Option<&Value>, expected: &Value) -> Result<bool, AssertError> {
    let size = parse_size(expected).ok_or_else(|| AssertError::InvalidSize(to_text(Some(expected))))?;
    let actual = match received {
        Some(Value::Array(items)) => items.len(),
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Object(map)) => map.len(),
        other => return Err(AssertError::Unsized(type_name(other).to_string())),
    };
    Ok(actual == size)
}

fn evaluate_regex(
    target: &Target,
    ops: &Map<String, Value>,
    received: Option<&Value>,
) -> AssertionResult {
    let pattern = ops.get("$regex").cloned().unwrap_or(Value::Null);
    let outcome = match_regex(ops, received);
    finish(target, Operator::Regex.as_str(), &pattern, received, outcome)
}

fn match_regex(ops: &Map<String, Value>, received: Option<&Value>) -> Result<bool, AssertError> {
    let pattern = match ops.get("$regex") {
        Some(Value::String(p)) => p.clone(),
        Some(Value::Null) | None => return Err(AssertError::MissingPattern),
        Some(other) => to_text(Some(other)),
    };

    let mut builder = RegexBuilder::new(&pattern);
    if let Some(options) = ops.get("$options") {
        for flag in to_text(Some(options)).chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(AssertError::InvalidRegex(format!(
                        "unsupported option '{}'",
                        other
                    )));
                }
            };
        }
    }

    let regex = builder
        .build()
        .map_err(|e| AssertError::InvalidRegex(e.to_string()))?;
    let received = received.ok_or(AssertError::MissingValue)?;
    let text = match received {
        Value::String(s) => s.clone(),
        other => to_text(Some(other)),
    };
    Ok(regex.is_match(&text))
}
