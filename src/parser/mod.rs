pub mod bundle;
pub mod merge;
pub mod types;

pub use bundle::BundleParser;
pub use merge::{EffectiveRequest, RequestOptions, ValidationError, merge_request};
pub use types::{
    Bundle, CaptureSpec, CommonSpec, OptionsSpec, Param, ParseError, ParseResult, RequestSpec,
    TestSpec,
};

/// 从文件路径解析 bundle
pub fn parse_file<P: AsRef<std::path::Path>>(path: P) -> ParseResult<Bundle> {
    BundleParser::parse_file(path)
}

/// 从字符串内容解析 bundle
pub fn parse_content(content: &str) -> ParseResult<Bundle> {
    BundleParser::parse_content(content)
}
