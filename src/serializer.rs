//! Serialization module for scan reports.
//!
//! A [`ScanReport`] bundles the statistics, the scanned records, and the validation
//! findings of one run. It can be rendered as YAML, JSON, or a human-readable summary and
//! written to a file or returned as a string.

use crate::extractor::ScanResult;
use crate::scanner::ScanStatistics;
use crate::validator::ValidationResult;
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Everything a `scan` run reports.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport<'a> {
    pub statistics: ScanStatistics,
    pub scan: &'a ScanResult,
    pub validation: &'a ValidationResult,
}

impl<'a> ScanReport<'a> {
    pub fn new(scan: &'a ScanResult, validation: &'a ValidationResult) -> Self {
        Self {
            statistics: ScanStatistics::from_result(scan),
            scan,
            validation,
        }
    }
}

/// Serializes a scan report to YAML.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(report: &ScanReport) -> Result<String> {
    debug!("Serializing scan report to YAML");
    serde_yaml::to_string(report).context("Failed to serialize scan report to YAML")
}

/// Serializes a scan report to JSON with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(report: &ScanReport) -> Result<String> {
    debug!("Serializing scan report to JSON");
    serde_json::to_string_pretty(report).context("Failed to serialize scan report to JSON")
}

/// Renders the human-readable summary printed by `scan`.
///
/// Lists the statistics, every route sorted by path, then scan errors, validation
/// errors, and warnings.
pub fn render_text(report: &ScanReport) -> String {
    let stats = &report.statistics;
    let mut out = String::new();

    let _ = writeln!(out, "Scan summary");
    let _ = writeln!(out, "  Handlers:  {}", stats.handlers_found);
    let _ = writeln!(out, "  Routes:    {}", stats.routes_found);
    let _ = writeln!(out, "  Providers: {}", stats.providers_found);
    let _ = writeln!(out, "  Packages:  {}", stats.packages_scanned);
    let _ = writeln!(out, "  Errors:    {}", stats.errors_found);

    if !report.scan.routes.is_empty() {
        let mut routes: Vec<_> = report.scan.routes.iter().collect();
        routes.sort_by(|a, b| {
            (&a.path, a.http_method.as_str(), &a.handler_ref).cmp(&(
                &b.path,
                b.http_method.as_str(),
                &b.handler_ref,
            ))
        });
        let _ = writeln!(out, "\nRoutes");
        for route in routes {
            let _ = writeln!(
                out,
                "  {:<7} {} -> {}",
                route.http_method, route.path, route.handler_ref
            );
        }
    }

    if !report.scan.providers.is_empty() {
        let mut providers: Vec<_> = report.scan.providers.iter().collect();
        providers.sort_by(|a, b| {
            (&a.package, &a.function_name).cmp(&(&b.package, &b.function_name))
        });
        let _ = writeln!(out, "\nProviders");
        for provider in providers {
            let _ = writeln!(
                out,
                "  {}.{} -> {}",
                provider.package, provider.function_name, provider.return_type
            );
        }
    }

    if !report.scan.errors.is_empty() {
        let _ = writeln!(out, "\nScan errors");
        for error in &report.scan.errors {
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                error.kind,
                error.source_file.display(),
                error.message
            );
        }
    }

    for (title, issues) in [
        ("Validation errors", &report.validation.errors),
        ("Validation warnings", &report.validation.warnings),
    ] {
        if issues.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", title);
        for issue in issues {
            let _ = writeln!(out, "  {}", issue);
        }
    }

    out
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does. Parent directories
/// are created as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
