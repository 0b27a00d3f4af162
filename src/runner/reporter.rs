use crate::runner::types::{RequestOutcome, RequestResult, RunSummary};
use crate::utils::value::to_text;
use crate::utils::{ResponseFormat, ResponseFormatter};
use colored::Colorize;

pub struct TestReporter {
    verbose: bool,
}

impl TestReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn formatter(&self, result: &RequestResult) -> ResponseFormatter {
        let format = if self.verbose {
            ResponseFormat::Verbose
        } else {
            ResponseFormat::Compact
        };
        ResponseFormatter::new(format)
            .with_headers(self.verbose || result.options.show_headers)
            .with_raw_json(result.options.keep_raw_json)
    }

    /// 打印单个请求结果
    pub fn print_result(&self, result: &RequestResult) {
        let label = format!("[{}] {}", result.request_number, result.name);

        match &result.outcome {
            RequestOutcome::NotRun => {
                println!(" {} {} {}", "⊘".dimmed(), label, "(not run)".dimmed());
                return;
            }
            RequestOutcome::Invalid { error } => {
                println!(" {} {}", "✗".red(), label);
                println!("   {}: {}", "Invalid".red().bold(), error);
                println!();
                return;
            }
            RequestOutcome::Cancelled => {
                println!(
                    " {} {} {} {} {}",
                    "⊘".yellow(),
                    label,
                    result.method.cyan(),
                    result.url,
                    "(cancelled)".yellow()
                );
                return;
            }
            _ => {}
        }

        let symbol = if result.is_success() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            " {} {} {} {} ({}ms)",
            symbol,
            label,
            result.method.cyan(),
            result.url,
            result.duration.as_millis()
        );

        if !result.undefined.is_empty() {
            println!(
                "   {}: undefined variables: {}",
                "Warning".yellow(),
                result.undefined.join(", ")
            );
        }

        // verbose 模式或失败时显示响应
        if let Some(response) = result.response()
            && (self.verbose || !result.is_success())
        {
            for line in self.formatter(result).format(response).lines() {
                println!("   {}", line);
            }
            println!();
        }

        if let Some(report) = result.assertions()
            && report.total > 0
        {
            println!("   Assertions:");
            for assertion in &report.results {
                if assertion.passed {
                    println!("     {} {}", "✓".green(), assertion.describe());
                } else {
                    println!("     {} {}", "✗".red(), assertion.describe());
                    if let Some(msg) = &assertion.message {
                        println!("       {}", msg.red());
                    }
                    if self.verbose {
                        println!(
                            "       received: {}",
                            to_text(assertion.received.as_ref()).dimmed()
                        );
                    }
                }
            }
            println!();
        }

        for error in result.capture_errors() {
            println!("   {}: {}", "Capture".yellow(), error);
        }
    }

    /// 打印运行开始
    pub fn print_header(&self, source: &str, total: usize) {
        println!("\nRunning {} requests from {}...\n", total, source.bold());
    }

    /// 打印运行摘要
    pub fn print_summary(&self, summary: &RunSummary) {
        println!("\n{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        let mut parts = vec![format!("{} completed", summary.completed.to_string().green())];
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed.to_string().red()));
        }
        if summary.invalid > 0 {
            parts.push(format!("{} invalid", summary.invalid.to_string().red()));
        }
        if summary.cancelled > 0 {
            parts.push(format!("{} cancelled", summary.cancelled.to_string().yellow()));
        }
        if summary.not_run > 0 {
            parts.push(format!("{} not run", summary.not_run.to_string().dimmed()));
        }
        println!(
            "  {}: {}, {} total",
            "Requests".bold(),
            parts.join(", "),
            summary.total
        );

        if summary.total_assertions > 0 {
            if summary.failed_assertions == 0 {
                println!(
                    "  {}: {} passed, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.total_assertions
                );
            } else {
                println!(
                    "  {}: {} passed, {} failed, {} total",
                    "Assertions".bold(),
                    summary.passed_assertions.to_string().green(),
                    summary.failed_assertions.to_string().red(),
                    summary.total_assertions
                );
            }
        }

        if summary.capture_errors > 0 {
            println!(
                "  {}: {} failed",
                "Captures".bold(),
                summary.capture_errors.to_string().yellow()
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for TestReporter {
    fn default() -> Self {
        Self::new(false)
    }
}
