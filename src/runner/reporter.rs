use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use colored::Colorize;
use tracing::info;

use crate::Result;
use crate::http::Response;
use crate::runner::types::{CaseResult, CaseStatus, RunResult, StepResult};

/// 报告输出：接收完成的运行结果
pub trait ReportBuilder {
    fn build(&self, run: &RunResult) -> Result<()>;
}

/// 终端报告
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 生成完整报告文本
    pub fn render(&self, run: &RunResult) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\nRan {} cases (run {})\n",
            run.cases().len(),
            run.run_id().dimmed()
        );

        for case in run.cases() {
            self.render_case(&mut out, case);
        }

        self.render_summary(&mut out, run);
        out
    }

    fn render_case(&self, out: &mut String, case: &CaseResult) {
        let group = case
            .group
            .as_deref()
            .map(|g| format!(" [{}]", g))
            .unwrap_or_default();

        match case.status {
            CaseStatus::Skipped => {
                let _ = writeln!(
                    out,
                    " {} {}{} {}",
                    "⊘".dimmed(),
                    case.case_id,
                    group,
                    "(skipped)".dimmed()
                );
                return;
            }
            CaseStatus::Passed => {
                let _ = writeln!(
                    out,
                    " {} {}{} ({}ms)",
                    "✓".green(),
                    case.case_id,
                    group,
                    case.duration.as_millis()
                );
            }
            CaseStatus::Failed => {
                let _ = writeln!(
                    out,
                    " {} {}{} ({}ms)",
                    "✗".red(),
                    case.case_id.bold(),
                    group,
                    case.duration.as_millis()
                );
            }
        }

        // verbose 模式显示所有步骤，否则只显示失败的步骤
        for step in &case.steps {
            if self.verbose || !step.passed() {
                self.render_step(out, step);
            }
        }
    }

    fn render_step(&self, out: &mut String, step: &StepResult) {
        let symbol = if step.passed() { "✓".green() } else { "✗".red() };
        let request_line = step
            .request
            .as_ref()
            .map(|r| r.request_line())
            .unwrap_or_else(|| "<unresolved request>".to_string());
        let retried = if step.retried { " (retried)" } else { "" };

        let _ = writeln!(
            out,
            "   {} [{}] {} {} ({}ms){}",
            symbol,
            step.index + 1,
            step.name,
            request_line.cyan(),
            step.duration.as_millis(),
            retried
        );

        if let Some(response) = &step.response {
            for line in format_response(response, self.verbose).lines() {
                let _ = writeln!(out, "     {}", line);
            }
        }

        if let Some(error) = &step.error {
            let _ = writeln!(out, "     {}: {}", "Error".red().bold(), error);
        }

        if !step.assertions().is_empty() {
            let _ = writeln!(out, "     Assertions:");
            for assertion in step.assertions() {
                if assertion.passed {
                    let _ = writeln!(out, "       {} {}", "✓".green(), assertion.raw);
                } else {
                    let _ = writeln!(out, "       {} {}", "✗".red(), assertion.raw);
                    if let Some(msg) = &assertion.message {
                        let _ = writeln!(out, "         {}", msg.red());
                    }
                }
            }
        }
    }

    fn render_summary(&self, out: &mut String, run: &RunResult) {
        let summary = run.summary();
        let _ = writeln!(out, "\n{}", "━".repeat(50));
        let _ = writeln!(out, "{}", "Summary".bold());
        let _ = writeln!(out, "{}", "━".repeat(50));
        let _ = writeln!(
            out,
            "  {}: {} passed, {} failed, {} skipped, {} total",
            "Cases".bold(),
            summary.passed.to_string().green(),
            summary.failed.to_string().red(),
            summary.skipped.to_string().dimmed(),
            summary.total
        );
        let _ = writeln!(
            out,
            "  {}: {:.3}s",
            "Duration".bold(),
            run.duration().as_secs_f64()
        );
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ReportBuilder for ConsoleReporter {
    fn build(&self, run: &RunResult) -> Result<()> {
        println!("{}", self.render(run));
        Ok(())
    }
}

/// 响应摘要；verbose 时包含 Header 和完整 Body
fn format_response(response: &Response, verbose: bool) -> String {
    let mut output = Vec::new();
    let status_line = format!("HTTP {}", response.status);
    let colored_status_line = if response.is_success() {
        status_line.green()
    } else if response.is_client_error() {
        status_line.yellow()
    } else {
        status_line.red()
    };
    output.push(colored_status_line.to_string());

    if verbose {
        for (key, value) in response.headers.iter() {
            let value_str = value.to_str().unwrap_or("<invalid utf-8>");
            output.push(format!("{}: {}", key, value_str).blue().to_string());
        }
    }

    let body = &response.body;
    if !body.is_empty() && (verbose || body.len() < 200) {
        // 尝试格式化 JSON，失败则显示原始内容
        let formatted_body = serde_json::from_str::<serde_json::Value>(body)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or_else(|_| body.to_string());
        output.push(formatted_body);
    } else if !body.is_empty() {
        output.push(format!("Body: {} bytes", body.len()));
    }

    output.join("\n")
}

/// 把运行结果写成 JSON 文件
pub struct JsonReport {
    path: PathBuf,
}

impl JsonReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn render(run: &RunResult) -> Result<String> {
        Ok(serde_json::to_string_pretty(run)?)
    }
}

impl ReportBuilder for JsonReport {
    fn build(&self, run: &RunResult) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, Self::render(run)?)?;
        info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::http::{Method, ResolvedRequest};
    use reqwest::header::HeaderMap;
    use std::time::Duration;

    fn sample_run() -> RunResult {
        let mut run = RunResult::new();

        let mut passed = CaseResult::skipped("login-ok", Some("auth".to_string()));
        passed.status = CaseStatus::Passed;
        run.record(passed);

        let mut failed = CaseResult::skipped("profile-broken", None);
        failed.status = CaseStatus::Failed;
        let mut step = StepResult::new(1, "get-profile".to_string());
        step.request = Some(ResolvedRequest::new(Method::Get, "http://api.test/users/1"));
        step.response = Some(
            Response::new(
                500,
                HeaderMap::new(),
                r#"{"error":"boom"}"#.to_string(),
                Duration::from_millis(3),
            )
            .unwrap(),
        );
        step.error = Some(StepError::Assertion {
            detail: "status == 200: Expected status to be == 200, but got 500".to_string(),
        });
        failed.steps.push(step);
        run.record(failed);

        run.record(CaseResult::skipped("later", None));
        run.finish();
        run
    }

    #[test]
    fn test_console_report_lists_every_case_and_failure_detail() {
        let text = ConsoleReporter::new(false).render(&sample_run());

        assert!(text.contains("login-ok"));
        assert!(text.contains("profile-broken"));
        assert!(text.contains("later"));
        assert!(text.contains("http://api.test/users/1"));
        assert!(text.contains("500 Internal Server Error"));
        assert!(text.contains("but got 500"));
    }

    #[test]
    fn test_json_report_written_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let run = sample_run();

        JsonReport::new(&path).build(&run).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["total"], 3);
        assert_eq!(written["cases"][1]["steps"][0]["error"]["kind"], "assertion");
        assert_eq!(written["run_id"], run.run_id());
    }
}
