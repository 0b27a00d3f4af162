use serde_json::Value;

use crate::assertion::types::{AssertError, Target};
use crate::http::ResponseRecord;
use crate::utils::json_path;

/// 从响应中提取断言目标的实际值
///
/// 值缺失（header 不存在、路径无匹配）返回 `Ok(None)`，
/// body 不是 JSON 或路径语法错误返回错误。
pub fn extract_value(response: &ResponseRecord, target: &Target) -> Result<Option<Value>, AssertError> {
    match target {
        Target::Status => Ok(response.status_code().map(Value::from)),

        Target::Body => Ok(Some(Value::String(response.body.clone()))),

        Target::Header(name) => Ok(response
            .header(name)
            .map(|value| Value::String(value.to_string()))),

        Target::Json(path) => {
            let json = response
                .json()
                .map_err(|e| AssertError::InvalidJson(e.to_string()))?;
            json_path::query(json, path).map_err(|e| AssertError::InvalidPath(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Status;
    use serde_json::json;
    use std::time::Duration;

    fn create_test_response(status: u16, body: &str) -> ResponseRecord {
        ResponseRecord::new(
            Status::new(status).unwrap(),
            vec![("Content-Type".to_string(), "application/json".to_string())],
            body.to_string(),
            Duration::from_millis(123),
        )
    }

    #[test]
    fn test_extract_status_and_body() {
        let response = create_test_response(201, r#"{"id": 1}"#);
        assert_eq!(
            extract_value(&response, &Target::Status).unwrap(),
            Some(json!(201))
        );
        assert_eq!(
            extract_value(&response, &Target::Body).unwrap(),
            Some(json!(r#"{"id": 1}"#))
        );
    }

    #[test]
    fn test_extract_header() {
        let response = create_test_response(200, "{}");
        assert_eq!(
            extract_value(&response, &Target::Header("content-type".to_string())).unwrap(),
            Some(json!("application/json"))
        );
        assert_eq!(
            extract_value(&response, &Target::Header("x-missing".to_string())).unwrap(),
            None
        );
    }

    #[test]
    fn test_extract_json() {
        let response = create_test_response(200, r#"{"user": {"tags": ["a", "b"]}}"#);
        assert_eq!(
            extract_value(&response, &Target::Json("$.user.tags[1]".to_string())).unwrap(),
            Some(json!("b"))
        );
        assert_eq!(
            extract_value(&response, &Target::Json("$.user.name".to_string())).unwrap(),
            None
        );
        assert!(matches!(
            extract_value(&response, &Target::Json("user".to_string())),
            Err(AssertError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_extract_json_from_invalid_body() {
        let response = create_test_response(200, "<html></html>");
        assert!(matches!(
            extract_value(&response, &Target::Json("$.a".to_string())),
            Err(AssertError::InvalidJson(_))
        ));
    }
}
