//! Terminal output: spinners for long-running commands and colored summaries.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::harness::ExecutionResult;
use crate::repair::RepairReport;
use crate::verifier::{HealthReport, VerifyResponse};

/// A spinner for one CLI command, finished by one of the `print_*` summaries.
pub struct TaskProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl TaskProgress {
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(description.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn update(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    pub fn succeed(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.green.apply_to("✓"));
    }

    pub fn fail(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
    }

    pub fn print_verify(&self, resp: &VerifyResponse) {
        if resp.success {
            self.succeed("verification passed");
        } else {
            self.fail("verification failed");
        }
        print_block("output", &resp.output);
        if let Some(err) = &resp.error {
            print_block("stderr", err);
        }
    }

    pub fn print_execution(&self, result: &ExecutionResult) {
        let summary = format!(
            "exit {} in {}ms",
            result
                .exit_code
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
            result.duration_ms
        );
        if result.timed_out {
            self.pb.finish_and_clear();
            println!(
                "  {} timed out ({summary})",
                self.yellow.apply_to("⏱")
            );
        } else if result.success {
            self.succeed(&summary);
        } else {
            self.fail(&summary);
        }
        print_block("stdout", &result.stdout);
        print_block("stderr", &result.stderr);
    }

    pub fn print_repair(&self, report: &RepairReport) {
        for attempt in &report.attempts {
            let mark = if attempt.verified {
                self.green.apply_to("✓")
            } else {
                self.yellow.apply_to("↻")
            };
            self.pb.println(format!(
                "  {mark} attempt {}: {}",
                attempt.attempt,
                first_line(&attempt.diagnostic)
            ));
        }
        if report.initially_valid {
            self.succeed(&format!("{} already passes the safety check", report.process));
        } else if report.repaired {
            self.succeed(&format!(
                "{} repaired after {} attempt(s)",
                report.process,
                report.attempts.len()
            ));
        } else {
            self.fail(&format!(
                "{} still fails after {} attempt(s)",
                report.process,
                report.attempts.len()
            ));
        }
    }

    pub fn print_health(&self, report: &HealthReport) {
        let flag = |ok: bool| {
            if ok {
                self.green.apply_to("yes")
            } else {
                self.red.apply_to("no")
            }
        };
        self.pb.finish_and_clear();
        println!("  jar ({}): {}", report.jar_path.display(), flag(report.jar_exists));
        println!("  java: {}", flag(report.java_available));
        if report.healthy {
            println!("  {} verifier healthy", self.green.apply_to("✓"));
        } else {
            println!("  {} verifier unavailable", self.red.apply_to("✗"));
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

fn print_block(label: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    println!("{}", Style::new().dim().apply_to(format!("─── {label} ───")));
    println!("{}", text.trim_end());
}
