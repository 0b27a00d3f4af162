//! JSON 路径查询
//!
//! 支持的语法：
//! - `$` 整个文档
//! - `$.user.name`、`$['user']["name"]` 字段访问
//! - `$.items[0]`、`$.items[-1]` 数组下标（负数从末尾计算）
//! - `$.items[*].id`、`$.user.*` 通配符
//!
//! 不含通配符的路径返回单个值；含通配符的路径把所有匹配收集为数组。
//! 没有任何匹配时返回 `None`。

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JsonPathError {
    #[error("JSON path must start with '$': {0}")]
    MissingRoot(String),

    #[error("Empty segment in JSON path at position {position}: {path}")]
    EmptySegment { path: String, position: usize },

    #[error("Unexpected character '{found}' at position {position} in JSON path: {path}")]
    UnexpectedChar {
        path: String,
        found: char,
        position: usize,
    },

    #[error("Unclosed bracket in JSON path: {0}")]
    UnclosedBracket(String),

    #[error("Invalid array index '{index}' in JSON path: {path}")]
    InvalidIndex { path: String, index: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
}

/// 在 `json` 上执行路径查询
pub fn query(json: &Value, path: &str) -> Result<Option<Value>, JsonPathError> {
    let segments = parse_path(path)?;
    let has_wildcard = segments.iter().any(|s| matches!(s, Segment::Wildcard));

    let mut current: Vec<&Value> = vec![json];
    for segment in &segments {
        let mut next = Vec::new();
        for node in current {
            match segment {
                Segment::Key(key) => {
                    if let Some(v) = node.as_object().and_then(|map| map.get(key)) {
                        next.push(v);
                    }
                }
                Segment::Index(index) => {
                    if let Some(v) = node.as_array().and_then(|items| index_into(items, *index)) {
                        next.push(v);
                    }
                }
                Segment::Wildcard => match node {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
            }
        }
        current = next;
    }

    if has_wildcard {
        if current.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Value::Array(current.into_iter().cloned().collect())));
    }
    Ok(current.first().map(|v| (*v).clone()))
}

fn index_into(items: &[Value], index: i64) -> Option<&Value> {
    let resolved = if index < 0 {
        i64::try_from(items.len()).ok()? + index
    } else {
        index
    };
    usize::try_from(resolved).ok().and_then(|i| items.get(i))
}

fn parse_path(path: &str) -> Result<Vec<Segment>, JsonPathError> {
    let trimmed = path.trim();
    let rest = trimmed
        .strip_prefix('$')
        .ok_or_else(|| JsonPathError::MissingRoot(trimmed.to_string()))?;

    let chars: Vec<char> = rest.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(&c) = chars.get(pos) {
        match c {
            '.' => {
                pos += 1;
                if chars.get(pos) == Some(&'*') {
                    segments.push(Segment::Wildcard);
                    pos += 1;
                    continue;
                }
                let start = pos;
                while let Some(&ch) = chars.get(pos) {
                    if ch == '.' || ch == '[' {
                        break;
                    }
                    pos += 1;
                }
                if start == pos {
                    return Err(JsonPathError::EmptySegment {
                        path: trimmed.to_string(),
                        position: start + 1,
                    });
                }
                segments.push(Segment::Key(chars[start..pos].iter().collect()));
            }
            '[' => {
                let (segment, next_pos) = parse_bracket(&chars, pos + 1, trimmed)?;
                segments.push(segment);
                pos = next_pos;
            }
            other => {
                return Err(JsonPathError::UnexpectedChar {
                    path: trimmed.to_string(),
                    found: other,
                    position: pos + 1,
                });
            }
        }
    }

    Ok(segments)
}

/// 解析 `[...]` 内部，`start` 指向 `[` 之后的字符，返回段和 `]` 之后的位置
fn parse_bracket(
    chars: &[char],
    start: usize,
    path: &str,
) -> Result<(Segment, usize), JsonPathError> {
    let unclosed = || JsonPathError::UnclosedBracket(path.to_string());

    if let Some(&quote) = chars.get(start).filter(|c| **c == '\'' || **c == '"') {
        let mut pos = start + 1;
        while chars.get(pos).ok_or_else(unclosed)? != &quote {
            pos += 1;
        }
        let key: String = chars[start + 1..pos].iter().collect();
        if chars.get(pos + 1) != Some(&']') {
            return Err(unclosed());
        }
        return Ok((Segment::Key(key), pos + 2));
    }

    let mut pos = start;
    while chars.get(pos).ok_or_else(unclosed)? != &']' {
        pos += 1;
    }
    let inner: String = chars[start..pos].iter().collect();
    let inner = inner.trim();
    let segment = if inner == "*" {
        Segment::Wildcard
    } else {
        let index = inner.parse::<i64>().map_err(|_| JsonPathError::InvalidIndex {
            path: path.to_string(),
            index: inner.to_string(),
        })?;
        Segment::Index(index)
    };
    Ok((segment, pos + 1))
}
