use crate::http::ResponseRecord;
use colored::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Compact,
    Verbose,
}

pub struct ResponseFormatter {
    format: ResponseFormat,
    color: bool,
    show_body: bool,
    show_headers: bool,
    show_timing: bool,
    keep_raw_json: bool,
}

impl ResponseFormatter {
    pub fn new(format: ResponseFormat) -> Self {
        Self {
            format,
            color: true,
            show_body: true,
            show_headers: format == ResponseFormat::Verbose,
            show_timing: true,
            keep_raw_json: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// 对应请求选项 `showHeaders`
    pub fn with_headers(mut self, show: bool) -> Self {
        self.show_headers = show;
        self
    }

    /// 对应请求选项 `keepRawJSON`，为真时不重新排版 JSON
    pub fn with_raw_json(mut self, keep: bool) -> Self {
        self.keep_raw_json = keep;
        self
    }

    pub fn format(&self, response: &ResponseRecord) -> String {
        let mut output = Vec::new();
        output.push(self.status_line(response));

        if self.show_timing {
            let timing = format!("Time: {}ms", response.duration.as_millis());
            output.push(self.paint(timing, |s| s.cyan()));
        }

        if response.is_error() {
            return output.join("\n");
        }

        if self.show_headers && !response.raw_headers.is_empty() {
            output.push(String::new());
            output.push(self.paint("Headers:".to_string(), |s| s.blue().bold()));
            for line in response.raw_headers.lines() {
                output.push(self.paint(format!("   {}", line), |s| s.blue()));
            }
        }

        if self.show_body && !response.body.is_empty() {
            let body = self.format_body(&response.body);
            match self.format {
                ResponseFormat::Compact if body.len() >= 200 => {
                    output.push(format!("Body: {} bytes", response.body.len()));
                }
                ResponseFormat::Compact => output.push(body),
                ResponseFormat::Verbose => {
                    output.push(String::new());
                    output.push(self.paint("Body:".to_string(), |s| s.blue().bold()));
                    output.push(body);
                }
            }
        }

        output.join("\n")
    }

    fn status_line(&self, response: &ResponseRecord) -> String {
        let Some(status) = response.status else {
            let line = format!("Error: {}", response.body);
            return self.paint(line, |s| s.red().bold());
        };

        let line = format!("HTTP {}", status);
        let bold = self.format == ResponseFormat::Verbose;
        self.paint(line, |s| {
            let s = if status.is_success() {
                s.green()
            } else if status.is_client_error() {
                s.yellow()
            } else {
                s.red()
            };
            if bold { s.bold() } else { s }
        })
    }

    fn paint(&self, text: String, style: impl FnOnce(ColoredString) -> ColoredString) -> String {
        if self.color {
            style(text.normal()).to_string()
        } else {
            text
        }
    }

    /// JSON body 重新排版，非 JSON 或 keepRawJSON 时原样返回
    fn format_body(&self, body: &str) -> String {
        if self.keep_raw_json {
            return body.to_string();
        }
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| serde_json::to_string_pretty(&value).ok())
            .unwrap_or_else(|| body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::Status;
    use crate::http::{TransportError, TransportErrorKind};
    use std::time::Duration;

    fn response(body: &str) -> ResponseRecord {
        ResponseRecord::new(
            Status::new(200).unwrap(),
            vec![("X-Id".to_string(), "7".to_string())],
            body.to_string(),
            Duration::from_millis(42),
        )
    }

    #[test]
    fn test_compact_pretty_json() {
        let formatter = ResponseFormatter::new(ResponseFormat::Compact).with_color(false);
        let out = formatter.format(&response(r#"{"a":1}"#));
        assert_eq!(out, "HTTP 200 OK\nTime: 42ms\n{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_keep_raw_json_and_headers() {
        let formatter = ResponseFormatter::new(ResponseFormat::Verbose)
            .with_color(false)
            .with_headers(true)
            .with_raw_json(true);
        let out = formatter.format(&response(r#"{"a":1}"#));
        assert!(out.contains("Headers:\n   HTTP/1.1 200 OK\n   x-id: 7"));
        assert!(out.ends_with("Body:\n{\"a\":1}"));
    }

    #[test]
    fn test_headers_hidden_by_default_in_compact() {
        let formatter = ResponseFormatter::new(ResponseFormat::Compact).with_color(false);
        assert!(!formatter.format(&response("ok")).contains("x-id"));
    }

    #[test]
    fn test_transport_error() {
        let formatter = ResponseFormatter::new(ResponseFormat::Verbose).with_color(false);
        let record = ResponseRecord::failed(
            TransportError::new(TransportErrorKind::Timeout, "after 30s"),
            Duration::from_secs(30),
        );
        assert_eq!(
            formatter.format(&record),
            "Error: Request timed out: after 30s\nTime: 30000ms"
        );
    }
}
