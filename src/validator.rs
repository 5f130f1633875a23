//! Consistency checks over a completed scan.

use crate::extractor::{HandlerFunction, RouteMapping, ScanResult};
use crate::generator::routes::normalize_route_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    DuplicateRoute,
    InvalidRoutePattern,
    RouteWithoutHandler,
    HandlerWithoutRoute,
    NamingConvention,
    TestFunction,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::DuplicateRoute => "duplicate_route",
            ValidationKind::InvalidRoutePattern => "invalid_route_pattern",
            ValidationKind::RouteWithoutHandler => "route_without_handler",
            ValidationKind::HandlerWithoutRoute => "handler_without_route",
            ValidationKind::NamingConvention => "naming_convention",
            ValidationKind::TestFunction => "test_function",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
    /// `METHOD path` of the route involved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// `package.Function` of the handler involved, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(file) = &self.source_file {
            write!(f, " ({})", file.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Checks a scan for route conflicts, malformed paths, and orphaned references.
///
/// Pure: the input is only read, and every finding is returned as data. Findings are
/// emitted in a deterministic order keyed by route and handler.
///
/// # Arguments
///
/// * `result` - A completed scan
/// * `handler_suffix` - Suffix expected on handler receiver type names
pub fn validate_scan_result(result: &ScanResult, handler_suffix: &str) -> ValidationResult {
    let mut validation = ValidationResult::default();

    let mut routes: Vec<&RouteMapping> = result.routes.iter().collect();
    routes.sort_by_key(|r| (route_label(r), route_key(r), r.source_file.clone()));

    check_duplicate_routes(&routes, &mut validation);
    check_route_patterns(&routes, &mut validation);
    check_cross_references(result, &mut validation);
    check_naming(&result.handlers, handler_suffix, &mut validation);

    validation
}

fn route_label(route: &RouteMapping) -> String {
    format!("{} {}", route.http_method, route.path)
}

fn route_key(route: &RouteMapping) -> String {
    format!("{}.{}", route.package, route.method_name)
}

fn handler_key(handler: &HandlerFunction) -> String {
    format!("{}.{}", handler.package, handler.function_name)
}

fn check_duplicate_routes(routes: &[&RouteMapping], validation: &mut ValidationResult) {
    let mut groups: BTreeMap<(&str, String), Vec<&RouteMapping>> = BTreeMap::new();
    for &route in routes {
        groups
            .entry((route.http_method.as_str(), normalize_route_path(&route.path)))
            .or_default()
            .push(route);
    }

    for ((method, path), members) in groups {
        if members.len() < 2 {
            continue;
        }
        for route in members.iter() {
            validation.errors.push(ValidationIssue {
                kind: ValidationKind::DuplicateRoute,
                message: format!(
                    "Duplicate route {} {} ({} declarations) declared by {}",
                    method,
                    path,
                    members.len(),
                    route_key(route)
                ),
                source_file: Some(route.source_file.clone()),
                route: Some(route_label(route)),
                handler: Some(route_key(route)),
            });
        }
    }
}

fn check_route_patterns(routes: &[&RouteMapping], validation: &mut ValidationResult) {
    for route in routes {
        let problem = if !route.path.starts_with('/') {
            Some("must start with '/'".to_string())
        } else {
            route
                .path
                .split('/')
                .filter(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
                .find(|segment| segment.chars().any(char::is_whitespace))
                .map(|segment| format!("segment '{}' contains whitespace", segment))
        };

        if let Some(problem) = problem {
            validation.errors.push(ValidationIssue {
                kind: ValidationKind::InvalidRoutePattern,
                message: format!("Invalid route path '{}': {}", route.path, problem),
                source_file: Some(route.source_file.clone()),
                route: Some(route_label(route)),
                handler: Some(route_key(route)),
            });
        }
    }
}

fn check_cross_references(result: &ScanResult, validation: &mut ValidationResult) {
    let handlers: BTreeMap<String, &HandlerFunction> = result
        .handlers
        .iter()
        .map(|h| (handler_key(h), h))
        .collect();
    let routes: BTreeMap<String, &RouteMapping> = result
        .routes
        .iter()
        .map(|r| (route_key(r), r))
        .collect();

    for (key, route) in &routes {
        if !handlers.contains_key(key) {
            validation.errors.push(ValidationIssue {
                kind: ValidationKind::RouteWithoutHandler,
                message: format!(
                    "Route {} refers to missing handler {}",
                    route_label(route),
                    key
                ),
                source_file: Some(route.source_file.clone()),
                route: Some(route_label(route)),
                handler: Some(key.clone()),
            });
        }
    }

    for (key, handler) in &handlers {
        if !routes.contains_key(key) {
            validation.warnings.push(ValidationIssue {
                kind: ValidationKind::HandlerWithoutRoute,
                message: format!("Handler {} has no route annotation", key),
                source_file: Some(handler.source_file.clone()),
                route: None,
                handler: Some(key.clone()),
            });
        }
    }
}

fn check_naming(
    handlers: &[HandlerFunction],
    handler_suffix: &str,
    validation: &mut ValidationResult,
) {
    let mut sorted: Vec<&HandlerFunction> = handlers
        .iter()
        .filter(|h| !h.is_interface_based)
        .collect();
    sorted.sort_by_key(|h| (handler_key(h), h.handler_name.clone()));

    for handler in sorted {
        if !handler.handler_name.ends_with(handler_suffix) {
            validation.warnings.push(ValidationIssue {
                kind: ValidationKind::NamingConvention,
                message: format!(
                    "Handler type {} of {} does not end with '{}'",
                    handler.handler_name,
                    handler_key(handler),
                    handler_suffix
                ),
                source_file: Some(handler.source_file.clone()),
                route: None,
                handler: Some(handler_key(handler)),
            });
        }

        if handler.function_name.to_lowercase().contains("test") {
            validation.warnings.push(ValidationIssue {
                kind: ValidationKind::TestFunction,
                message: format!(
                    "Handler {} looks like a test function",
                    handler_key(handler)
                ),
                source_file: Some(handler.source_file.clone()),
                route: None,
                handler: Some(handler_key(handler)),
            });
        }
    }
}
