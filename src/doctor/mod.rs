//! Environment readiness checks.
//!
//! The doctor runs the built-in toolchain probes followed by the spec's own
//! checks (named `custom-1`, `custom-2`, ...). A check passes iff its
//! command exits 0.

mod runner;

pub use runner::{CommandOutput, CommandRunner, ShellRunner};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::Result;
use crate::state::AuditLog;

/// Built-in checks run before any spec checks.
pub const BUILTIN_CHECKS: &[(&str, &str)] = &[
    ("python", "python --version"),
    ("git", "git --version"),
];

/// Location of the doctor report, relative to the state directory.
pub const DOCTOR_REPORT_FILE: &str = "diagnostics/doctor.json";

/// Result of a single check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Check name.
    pub name: String,
    /// Command that was run.
    pub command: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Trimmed command output.
    pub output: String,
}

/// Results of a doctor run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    /// Check results in execution order.
    pub results: Vec<CheckResult>,
}

impl DoctorReport {
    /// Returns true if every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Returns the number of failed checks.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Maps check names to their output.
    #[must_use]
    pub fn as_map(&self) -> IndexMap<String, String> {
        self.results
            .iter()
            .map(|r| (r.name.clone(), r.output.clone()))
            .collect()
    }

    /// Returns the report document written to [`DOCTOR_REPORT_FILE`].
    #[must_use]
    pub fn to_document(&self) -> Value {
        Value::Object(
            self.results
                .iter()
                .map(|r| (r.name.clone(), Value::String(r.output.clone())))
                .collect(),
        )
    }
}

/// Runs readiness checks.
#[derive(Debug)]
pub struct Doctor<R> {
    runner: R,
    audit: Option<AuditLog>,
}

impl<R: CommandRunner> Doctor<R> {
    /// Creates a doctor using `runner`.
    #[must_use]
    pub const fn new(runner: R) -> Self {
        Self {
            runner,
            audit: None,
        }
    }

    /// Records check events to `audit`.
    #[must_use]
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Runs the built-in checks, then `checks` as `custom-<n>`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the audit log cannot be written.
    pub async fn run(&self, checks: &[String]) -> Result<DoctorReport> {
        let builtin = BUILTIN_CHECKS
            .iter()
            .map(|(name, command)| ((*name).to_string(), (*command).to_string()));
        let custom = checks
            .iter()
            .enumerate()
            .map(|(idx, command)| (format!("custom-{}", idx + 1), command.clone()));

        let mut report = DoctorReport::default();
        for (name, command) in builtin.chain(custom) {
            report.results.push(self.run_check(name, command).await?);
        }

        info!(
            "Doctor finished: {} checks, {} failed",
            report.results.len(),
            report.failed_count()
        );
        Ok(report)
    }

    async fn run_check(&self, name: String, command: String) -> Result<CheckResult> {
        let (passed, output) = match self.runner.run(&command).await {
            Ok(result) => (result.success, result.summary()),
            Err(e) => (false, e.to_string()),
        };

        let event = if passed {
            "health_check_pass"
        } else {
            warn!("Check {name} failed: {output}");
            "health_check_fail"
        };

        if let Some(audit) = &self.audit {
            audit
                .record(
                    event,
                    json!({ "name": name, "command": command, "output": output }),
                )
                .await?;
        }

        Ok(CheckResult {
            name,
            command,
            passed,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnvkitError, ProvisionError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Runner returning canned results; unknown commands fail to start.
    struct FakeRunner {
        results: HashMap<&'static str, CommandOutput>,
    }

    impl FakeRunner {
        fn new() -> Self {
            let mut results = HashMap::new();
            results.insert(
                "python --version",
                CommandOutput {
                    success: true,
                    stdout: String::from("Python 3.11.4\n"),
                    ..CommandOutput::default()
                },
            );
            results.insert(
                "git --version",
                CommandOutput {
                    success: true,
                    stdout: String::from("git version 2.43.0\n"),
                    ..CommandOutput::default()
                },
            );
            results.insert(
                "make lint",
                CommandOutput {
                    success: false,
                    stderr: String::from("lint failed\n"),
                    exit_code: Some(2),
                    ..CommandOutput::default()
                },
            );
            Self { results }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &str) -> Result<CommandOutput> {
            self.results.get(command).cloned().ok_or_else(|| {
                EnvkitError::Provision(ProvisionError::CheckFailed {
                    name: command.to_string(),
                    message: String::from("not found"),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_builtin_checks_pass() {
        let report = Doctor::new(FakeRunner::new()).run(&[]).await.unwrap();

        assert!(report.passed());
        assert_eq!(
            report.as_map().keys().collect::<Vec<_>>(),
            vec!["python", "git"]
        );
        assert_eq!(report.as_map()["python"], "Python 3.11.4");
    }

    #[tokio::test]
    async fn test_custom_checks_numbered() {
        let temp = TempDir::new().unwrap();
        let audit = AuditLog::in_state_dir(temp.path());
        let doctor = Doctor::new(FakeRunner::new()).with_audit(audit.clone());

        let checks = vec![String::from("make lint"), String::from("cargo --version")];
        let report = doctor.run(&checks).await.unwrap();

        assert!(!report.passed());
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.results[2].name, "custom-1");
        assert_eq!(report.results[2].output, "lint failed");
        assert_eq!(report.results[3].name, "custom-2");
        assert!(report.results[3].output.contains("not found"));

        let document = report.to_document();
        assert_eq!(document["custom-1"], "lint failed");

        let events: Vec<_> = audit
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(
            events,
            vec![
                "health_check_pass",
                "health_check_pass",
                "health_check_fail",
                "health_check_fail"
            ]
        );
    }
}
