use crate::assertion::AssertionReport;
use crate::http::ResponseRecord;
use crate::parser::{RequestOptions, ValidationError};
use crate::variable::{CaptureError, VariableStore};
use std::time::Duration;

/// 单个请求的执行结局
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// 收到响应，断言与捕获已执行
    Completed {
        response: ResponseRecord,
        assertions: AssertionReport,
        capture_errors: Vec<CaptureError>,
    },

    /// 传输失败，响应记录携带错误描述
    Failed { response: ResponseRecord },

    /// 合并校验失败，未发出请求
    Invalid { error: ValidationError },

    /// 用户取消，没有响应记录
    Cancelled,

    /// 批量运行被取消后未开始的请求
    NotRun,
}

/// 单个请求的执行结果
#[derive(Debug, Clone)]
pub struct RequestResult {
    /// 请求序号（从 1 开始）
    pub request_number: usize,

    pub name: String,

    /// 替换变量后的方法，校验失败时为空
    pub method: String,

    /// 替换变量后的完整 URL，校验失败时为空
    pub url: String,

    /// 未定义的变量名
    pub undefined: Vec<String>,

    pub options: RequestOptions,

    pub duration: Duration,

    pub outcome: RequestOutcome,
}

impl RequestResult {
    pub fn new(request_number: usize, name: impl Into<String>, outcome: RequestOutcome) -> Self {
        Self {
            request_number,
            name: name.into(),
            method: String::new(),
            url: String::new(),
            undefined: Vec::new(),
            options: RequestOptions::default(),
            duration: Duration::ZERO,
            outcome,
        }
    }

    pub fn response(&self) -> Option<&ResponseRecord> {
        match &self.outcome {
            RequestOutcome::Completed { response, .. } | RequestOutcome::Failed { response } => {
                Some(response)
            }
            _ => None,
        }
    }

    pub fn assertions(&self) -> Option<&AssertionReport> {
        match &self.outcome {
            RequestOutcome::Completed { assertions, .. } => Some(assertions),
            _ => None,
        }
    }

    pub fn capture_errors(&self) -> &[CaptureError] {
        match &self.outcome {
            RequestOutcome::Completed { capture_errors, .. } => capture_errors,
            _ => &[],
        }
    }

    /// 请求完成且全部断言通过
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, RequestOutcome::Completed { assertions, .. } if assertions.all_passed())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RequestOutcome::Cancelled)
    }
}

/// 一次运行的结果，包含运行结束时的变量存储
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: Vec<RequestResult>,
    pub variables: VariableStore,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.results)
    }

    pub fn result(&self, name: &str) -> Option<&RequestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub invalid: usize,
    pub cancelled: usize,
    pub not_run: usize,
    pub total_duration: Duration,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
    pub capture_errors: usize,
}

impl RunSummary {
    pub fn from_results(results: &[RequestResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            total_duration: results.iter().map(|r| r.duration).sum(),
            ..Self::default()
        };

        for result in results {
            match &result.outcome {
                RequestOutcome::Completed {
                    assertions,
                    capture_errors,
                    ..
                } => {
                    summary.completed += 1;
                    summary.total_assertions += assertions.total;
                    summary.passed_assertions += assertions.passed();
                    summary.failed_assertions += assertions.failed;
                    summary.capture_errors += capture_errors.len();
                }
                RequestOutcome::Failed { .. } => summary.failed += 1,
                RequestOutcome::Invalid { .. } => summary.invalid += 1,
                RequestOutcome::Cancelled => summary.cancelled += 1,
                RequestOutcome::NotRun => summary.not_run += 1,
            }
        }

        summary
    }

    /// 没有失败的请求和断言
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.invalid == 0 && self.failed_assertions == 0
    }
}
