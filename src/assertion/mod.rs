/// 断言模块 - 按声明式断言树检查响应
mod evaluator;
mod extractor;
mod types;

pub use evaluator::evaluate_leaf;
pub use extractor::extract_value;
pub use types::{AssertError, AssertionReport, AssertionResult, Operator, Target};

use crate::http::ResponseRecord;
use crate::parser::TestSpec;

/// 执行请求的全部断言
pub fn run_assertions(tests: &TestSpec, response: &ResponseRecord) -> AssertionReport {
    run_assertions_with_options(tests, response, false)
}

/// 执行断言，顺序为 status、body、headers、json
///
/// `stop_on_failure` 为真且 status 断言失败时，其余断言不再执行也不计数
pub fn run_assertions_with_options(
    tests: &TestSpec,
    response: &ResponseRecord,
    stop_on_failure: bool,
) -> AssertionReport {
    let mut report = AssertionReport::new();

    if let Some(expected) = &tests.status {
        check(&mut report, Target::Status, expected, response);
        if stop_on_failure && !report.all_passed() {
            tracing::debug!("Status assertion failed, skipping remaining assertions");
            return report;
        }
    }

    if let Some(expected) = &tests.body {
        check(&mut report, Target::Body, expected, response);
    }

    for (name, expected) in &tests.headers {
        check(
            &mut report,
            Target::Header(name.to_ascii_lowercase()),
            expected,
            response,
        );
    }

    for (path, expected) in &tests.json {
        check(&mut report, Target::Json(path.clone()), expected, response);
    }

    tracing::debug!(
        total = report.total,
        failed = report.failed,
        "Assertions evaluated"
    );
    report
}

fn check(
    report: &mut AssertionReport,
    target: Target,
    expected: &serde_json::Value,
    response: &ResponseRecord,
) {
    let received = extract_value(response, &target);
    report.extend(evaluate_leaf(&target, expected, received));
}
