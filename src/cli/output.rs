//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;
use tabled::{Table, Tabled};

use crate::config::{EnvironmentSpec, SpecHasher, ValidationResult};
use crate::doctor::DoctorReport;
use crate::environment::HierarchyValidation;
use crate::infra::InfraOperation;
use crate::provision::ProvisionReport;
use crate::secrets::{ProviderHealth, SecretFetch, SecretRotation};
use crate::state::{Snapshot, SnapshotCheck};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Environment row for table display.
#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Toolchains")]
    toolchains: String,
    #[tabled(rename = "Secrets")]
    secrets: usize,
    #[tabled(rename = "Policies")]
    policies: usize,
    #[tabled(rename = "Checks")]
    checks: usize,
}

/// Doctor check row for table display.
#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Check")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Output")]
    output: String,
}

/// Secret row for table display.
#[derive(Tabled)]
struct SecretRow {
    #[tabled(rename = "Secret")]
    key: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats spec and hierarchy validation results.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        hierarchy: &HierarchyValidation,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "spec": result,
                "hierarchy": hierarchy,
            })),
            OutputFormat::Text => {
                let mut output = String::new();

                for error in &result.errors {
                    let _ = writeln!(output, "{} {error}", "✗".red());
                }
                for error in &hierarchy.errors {
                    let _ = writeln!(output, "{} {error}", "✗".red());
                }
                if show_warnings {
                    for warning in &result.warnings {
                        let _ = writeln!(output, "{} {warning}", "⚠".yellow());
                    }
                }

                if result.is_valid() && hierarchy.valid {
                    let _ = writeln!(
                        output,
                        "{} Spec is valid ({} warnings)",
                        "✓".green(),
                        result.warning_count()
                    );
                } else {
                    let _ = writeln!(
                        output,
                        "\n{} errors found",
                        result.error_count() + hierarchy.errors.len()
                    );
                }

                output
            }
        }
    }

    /// Formats a list of resolved environments.
    #[must_use]
    pub fn format_environments(&self, environments: &[&EnvironmentSpec]) -> String {
        match self.format {
            OutputFormat::Json => {
                let names: Vec<&str> = environments.iter().map(|e| e.name.as_str()).collect();
                to_json(&names)
            }
            OutputFormat::Text => {
                let rows: Vec<EnvironmentRow> = environments
                    .iter()
                    .map(|e| EnvironmentRow {
                        name: e.name.clone(),
                        toolchains: e
                            .toolchains
                            .iter()
                            .map(|t| format!("{}@{}", t.name, t.version))
                            .collect::<Vec<_>>()
                            .join(", "),
                        secrets: e.secrets.len(),
                        policies: e.policies.len(),
                        checks: e.checks.len(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a single resolved environment.
    #[must_use]
    pub fn format_environment(&self, spec: &EnvironmentSpec) -> String {
        match self.format {
            OutputFormat::Json => to_json(spec),
            OutputFormat::Text => serde_yaml::to_string(spec).unwrap_or_default(),
        }
    }

    /// Formats hierarchy validation results.
    #[must_use]
    pub fn format_hierarchy(&self, hierarchy: &HierarchyValidation) -> String {
        match self.format {
            OutputFormat::Json => to_json(hierarchy),
            OutputFormat::Text => {
                if hierarchy.valid {
                    return format!("{} Environment hierarchy is valid\n", "✓".green());
                }
                let mut output = String::new();
                for error in &hierarchy.errors {
                    let _ = writeln!(output, "{} {error}", "✗".red());
                }
                output
            }
        }
    }

    /// Formats a fingerprint.
    #[must_use]
    pub fn format_fingerprint(&self, environment: &str, fingerprint: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "environment": environment,
                "fingerprint": fingerprint,
            })),
            OutputFormat::Text => format!("{fingerprint}\n"),
        }
    }

    /// Formats a doctor report.
    #[must_use]
    pub fn format_doctor(&self, report: &DoctorReport, path: &Path) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => {
                let rows: Vec<CheckRow> = report
                    .results
                    .iter()
                    .map(|r| CheckRow {
                        name: r.name.clone(),
                        result: if r.passed {
                            "pass".green().to_string()
                        } else {
                            "fail".red().to_string()
                        },
                        output: truncate(&r.output, 50),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let status = if report.passed() {
                    "pass".green()
                } else {
                    "fail".red()
                };
                let _ = write!(
                    output,
                    "\n\nDoctor status: {status}. Details saved to {}\n",
                    path.display()
                );
                output
            }
        }
    }

    /// Formats a provisioning report.
    #[must_use]
    pub fn format_provision(&self, report: &ProvisionReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Provisioned environment '{}' with {} toolchains\n",
                    "✓".green(),
                    report.environment,
                    report.toolchains
                );
                let _ = writeln!(
                    output,
                    "   Secrets: {} fetched, {} unavailable",
                    report.secrets.values.len(),
                    report.secrets.failures.len()
                );
                let _ = writeln!(output, "   Policies: {} loaded", report.policies_loaded);
                for policy in &report.missing_policies {
                    let _ = writeln!(output, "   {} missing policy: {policy}", "⚠".yellow());
                }
                for failure in &report.secrets.failures {
                    let _ = writeln!(output, "   {} {}: {}", "⚠".yellow(), failure.key, failure.message);
                }
                let _ = writeln!(output, "   Summary: {}", report.summary_path.display());
                output
            }
        }
    }

    /// Formats a freshly written snapshot.
    #[must_use]
    pub fn format_snapshot(&self, snapshot: &Snapshot, lock_path: &Path) -> String {
        match self.format {
            OutputFormat::Json => to_json(snapshot),
            OutputFormat::Text => format!(
                "{} Snapshot of '{}' written to {} ({})\n",
                "✓".green(),
                snapshot.spec().name,
                lock_path.display(),
                SpecHasher::new().short_hash(snapshot.fingerprint())
            ),
        }
    }

    /// Formats a lockfile comparison.
    #[must_use]
    pub fn format_check(&self, check: &SnapshotCheck) -> String {
        match self.format {
            OutputFormat::Json => to_json(check),
            OutputFormat::Text => {
                if check.matches {
                    format!(
                        "{} '{}' matches its lockfile ({})\n",
                        "✓".green(),
                        check.environment,
                        SpecHasher::new().short_hash(&check.actual)
                    )
                } else {
                    format!(
                        "{} '{}' has drifted from its lockfile\n   expected: {}\n   actual:   {}\n",
                        "✗".red(),
                        check.environment,
                        check.expected,
                        check.actual
                    )
                }
            }
        }
    }

    /// Formats a secret fetch.
    #[must_use]
    pub fn format_secrets(&self, fetched: &SecretFetch) -> String {
        match self.format {
            OutputFormat::Json => to_json(fetched),
            OutputFormat::Text => {
                let rows = fetched
                    .values
                    .keys()
                    .map(|key| SecretRow {
                        key: key.clone(),
                        status: "fetched".green().to_string(),
                    })
                    .chain(fetched.failures.iter().map(|f| SecretRow {
                        key: f.key.clone(),
                        status: truncate(&f.message, 50).red().to_string(),
                    }));
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a secret rotation.
    #[must_use]
    pub fn format_rotation(&self, rotation: &SecretRotation) -> String {
        match self.format {
            OutputFormat::Json => to_json(rotation),
            OutputFormat::Text => {
                let mut output = String::new();
                for key in &rotation.rotated {
                    let _ = writeln!(output, "{} rotated {key}", "✓".green());
                }
                for failure in &rotation.failures {
                    let _ = writeln!(output, "{} {}: {}", "✗".red(), failure.key, failure.message);
                }
                if output.is_empty() {
                    output.push_str("No secrets declared.\n");
                }
                output
            }
        }
    }

    /// Formats provider health.
    #[must_use]
    pub fn format_health(&self, health: &[ProviderHealth]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&health),
            OutputFormat::Text => {
                let mut output = String::new();
                for provider in health {
                    let marker = if provider.healthy {
                        "✓".green()
                    } else {
                        "✗".red()
                    };
                    let _ = write!(output, "{marker} {}", provider.kind);
                    if let Some(message) = &provider.message {
                        let _ = write!(output, " ({message})");
                    }
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats the result of an infrastructure operation.
    #[must_use]
    pub fn format_infra(&self, provider: &str, operation: InfraOperation, result: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "provider": provider,
                "operation": operation.as_str(),
                "result": result,
            })),
            OutputFormat::Text => format!("{result}\n"),
        }
    }

    /// Formats registered plugin names.
    #[must_use]
    pub fn format_plugins(&self, names: &[&str]) -> String {
        match self.format {
            OutputFormat::Json => to_json(&names),
            OutputFormat::Text => {
                if names.is_empty() {
                    String::from("No plugins registered\n")
                } else {
                    format!("Registered plugins: {}\n", names.join(", "))
                }
            }
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, marker: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "status": status,
                "message": message,
            })),
            OutputFormat::Text => format!("{marker} {message}\n"),
        }
    }
}

/// Serializes `value` as pretty JSON with a trailing newline.
fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut output = serde_json::to_string_pretty(value).unwrap_or_default();
    output.push('\n');
    output
}

/// Truncates a string to a maximum number of characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Toolchain;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long output line", 10), "a very ...");
    }

    #[test]
    fn test_json_fingerprint() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_fingerprint("svc", "abc");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["environment"], "svc");
        assert_eq!(value["fingerprint"], "abc");
    }

    #[test]
    fn test_text_environments_table() {
        let mut spec = EnvironmentSpec::new("svc");
        spec.toolchains.push(Toolchain::new("python", "3.11"));

        let output = OutputFormatter::new(OutputFormat::Text).format_environments(&[&spec]);
        assert!(output.contains("svc"));
        assert!(output.contains("python@3.11"));
    }

    #[test]
    fn test_plugins_empty() {
        let output = OutputFormatter::new(OutputFormat::Text).format_plugins(&[]);
        assert_eq!(output, "No plugins registered\n");
    }
}
