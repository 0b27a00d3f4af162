//! 模板变量替换
//!
//! 两种占位符写法：
//! - 定界形式 `$(name)`
//! - 裸形式 `$name`，名称贪婪匹配单词字符
//!
//! 名称首字符为字母或下划线，其后为字母、数字、下划线。
//! `\$` 后跟合法占位符时表示字面量 `$`，反斜杠本身不输出；
//! 其他位置的 `\$` 原样保留。
//!
//! 整个字符串恰好是一个占位符时返回变量的原生值（数字、布尔、对象），
//! 否则按文本拼接。未定义的变量保持原样并记录名称。

use crate::utils::value::to_text;
use crate::variable::types::VariableStore;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Var { name: &'a str, raw: &'a str },
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `$(` 开头的定界占位符，返回名称范围和结束位置
fn match_delimited(bytes: &[u8], dollar: usize) -> Option<(usize, usize, usize)> {
    if bytes.get(dollar + 1) != Some(&b'(') {
        return None;
    }
    let start = dollar + 2;
    if !bytes.get(start).copied().is_some_and(is_name_start) {
        return None;
    }
    let mut end = start + 1;
    while bytes.get(end).copied().is_some_and(is_word) {
        end += 1;
    }
    if bytes.get(end) != Some(&b')') {
        return None;
    }
    Some((start, end, end + 1))
}

/// `$name` 裸占位符
fn match_bare(bytes: &[u8], dollar: usize) -> Option<(usize, usize, usize)> {
    let start = dollar + 1;
    if !bytes.get(start).copied().is_some_and(is_name_start) {
        return None;
    }
    let mut end = start + 1;
    while bytes.get(end).copied().is_some_and(is_word) {
        end += 1;
    }
    Some((start, end, end))
}

/// 扫描字符串：先尝试定界形式，再尝试裸形式
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while let Some(&b) = bytes.get(i) {
        // 只有后面确实是占位符时 `\$` 才算转义，否则原样保留（如正则中的 `\$\d`）
        if b == b'\\'
            && bytes.get(i + 1) == Some(&b'$')
            && (match_delimited(bytes, i + 1).is_some() || match_bare(bytes, i + 1).is_some())
        {
            if text_start < i {
                tokens.push(Token::Text(&input[text_start..i]));
            }
            tokens.push(Token::Text("$"));
            i += 2;
            text_start = i;
            continue;
        }

        if b == b'$' {
            let found = match_delimited(bytes, i).or_else(|| match_bare(bytes, i));
            if let Some((name_start, name_end, next)) = found {
                if text_start < i {
                    tokens.push(Token::Text(&input[text_start..i]));
                }
                tokens.push(Token::Var {
                    name: &input[name_start..name_end],
                    raw: &input[i..next],
                });
                i = next;
                text_start = i;
                continue;
            }
        }

        i += 1;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

/// 变量替换器，累积未定义的变量名
pub struct VariableResolver<'a> {
    store: &'a VariableStore,
    undefined: Vec<String>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(store: &'a VariableStore) -> Self {
        Self {
            store,
            undefined: Vec::new(),
        }
    }

    /// 深度遍历替换，只改写字符串，其他标量原样返回
    pub fn resolve_value(&mut self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.resolve_str(s),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// 替换单个字符串，整串占位符保留原生类型
    pub fn resolve_str(&mut self, input: &str) -> Value {
        let tokens = tokenize(input);
        if let [Token::Var { name, raw }] = tokens.as_slice() {
            return match self.store.resolve(name) {
                Some(value) => value.clone(),
                None => {
                    self.note_undefined(name);
                    Value::String((*raw).to_string())
                }
            };
        }
        Value::String(self.render(&tokens))
    }

    /// 替换为文本（URL、header 等只接受字符串的位置）
    pub fn resolve_text(&mut self, input: &str) -> String {
        let tokens = tokenize(input);
        self.render(&tokens)
    }

    pub fn undefined(&self) -> &[String] {
        &self.undefined
    }

    pub fn into_undefined(self) -> Vec<String> {
        self.undefined
    }

    fn render(&mut self, tokens: &[Token<'_>]) -> String {
        let mut out = String::new();
        for token in tokens {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Var { name, raw } => match self.store.resolve(name) {
                    Some(value) => out.push_str(&to_text(Some(value))),
                    None => {
                        self.note_undefined(name);
                        out.push_str(raw);
                    }
                },
            }
        }
        out
    }

    fn note_undefined(&mut self, name: &str) {
        if !self.undefined.iter().any(|n| n == name) {
            self.undefined.push(name.to_string());
        }
    }
}

/// 替换任意值中的变量，返回替换结果和未定义的变量名
pub fn resolve_variables(value: &Value, store: &VariableStore) -> (Value, Vec<String>) {
    let mut resolver = VariableResolver::new(store);
    let resolved = resolver.resolve_value(value);
    (resolved, resolver.into_undefined())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store.insert("port", json!(8080));
        store.insert("host", json!("example.com"));
        store.insert("flag", json!(true));
        store.insert("user", json!({"id": 1, "name": "ann"}));
        store.insert("empty", Value::Null);
        store
    }

    #[test]
    fn test_whole_string_keeps_native_type() {
        let (value, undefined) = resolve_variables(&json!("$port"), &store());
        assert_eq!(value, json!(8080));
        assert!(undefined.is_empty());

        let (value, _) = resolve_variables(&json!("$(flag)"), &store());
        assert_eq!(value, json!(true));

        let (value, _) = resolve_variables(&json!("$user"), &store());
        assert_eq!(value, json!({"id": 1, "name": "ann"}));
    }

    #[test]
    fn test_embedded_placeholder_becomes_text() {
        let (value, _) = resolve_variables(&json!("port=$port"), &store());
        assert_eq!(value, json!("port=8080"));

        let (value, _) = resolve_variables(&json!("http://$(host):$(port)/x"), &store());
        assert_eq!(value, json!("http://example.com:8080/x"));

        let (value, _) = resolve_variables(&json!("u=$user;e=$empty"), &store());
        assert_eq!(value, json!(r#"u={"id":1,"name":"ann"};e=null"#));
    }

    #[test]
    fn test_bare_form_terminates_at_non_word() {
        let (value, _) = resolve_variables(&json!("$host/api"), &store());
        assert_eq!(value, json!("example.com/api"));

        let (value, undefined) = resolve_variables(&json!("$hostname"), &store());
        assert_eq!(value, json!("$hostname"));
        assert_eq!(undefined, vec!["hostname".to_string()]);
    }

    #[test]
    fn test_delimited_form_inside_word() {
        let (value, _) = resolve_variables(&json!("abc$(host)def"), &store());
        assert_eq!(value, json!("abcexample.comdef"));
    }

    #[test]
    fn test_escape_suppresses_substitution() {
        let (value, undefined) = resolve_variables(&json!(r"cost \$port"), &store());
        assert_eq!(value, json!("cost $port"));
        assert!(undefined.is_empty());

        let (value, _) = resolve_variables(&json!(r"\$(host)"), &store());
        assert_eq!(value, json!("$(host)"));
    }

    #[test]
    fn test_backslash_dollar_without_placeholder_kept() {
        for input in [r"^\$\d+$", r"\$", r"a\$ b", r"\$(1)"] {
            let (value, undefined) = resolve_variables(&json!(input), &store());
            assert_eq!(value, json!(input));
            assert!(undefined.is_empty(), "unexpected undefined for {input}");
        }

        let (value, _) = resolve_variables(&json!(r"^\$\d+ costs \$port$"), &store());
        assert_eq!(value, json!(r"^\$\d+ costs $port$"));
    }

    #[test]
    fn test_non_placeholders_untouched() {
        for input in ["$", "$1abc", "$.path", "$(", "$( host)", "price: 5$"] {
            let (value, undefined) = resolve_variables(&json!(input), &store());
            assert_eq!(value, json!(input));
            assert!(undefined.is_empty(), "unexpected undefined for {input}");
        }
    }

    #[test]
    fn test_undefined_collected_once_in_order() {
        let input = json!({
            "a": "$missing and $(other)",
            "b": ["$missing", 5, null],
        });
        let (value, undefined) = resolve_variables(&input, &store());
        assert_eq!(value, input);
        assert_eq!(undefined, vec!["missing".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_nested_traversal() {
        let input = json!({"outer": {"list": ["$port", "x$(host)"]}, "n": 3});
        let (value, _) = resolve_variables(&input, &store());
        assert_eq!(
            value,
            json!({"outer": {"list": [8080, "xexample.com"]}, "n": 3})
        );
    }

    #[test]
    fn test_idempotent() {
        let input = json!({"plain": "no placeholders here", "n": 1.5});
        let (once, u1) = resolve_variables(&input, &store());
        assert_eq!(once, input);

        let unresolved = json!("$nope");
        let (first, u2) = resolve_variables(&unresolved, &store());
        let (second, u3) = resolve_variables(&first, &store());
        assert!(u1.is_empty());
        assert_eq!(u2, u3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_text_stringifies_whole_placeholder() {
        let store = store();
        let mut resolver = VariableResolver::new(&store);
        assert_eq!(resolver.resolve_text("$port"), "8080");
        assert!(resolver.undefined().is_empty());
    }
}
