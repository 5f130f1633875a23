//! Source extraction module for finding handlers, routes, and providers in Go code.
//!
//! This module defines the records produced by a scan and a unified interface for
//! extracting them from one source file. The Go implementation lives in [`go`]; route
//! annotation parsing lives in [`annotation`], and the handler-role heuristics in
//! [`classify`].
//!
//! # Example
//!
//! ```no_run
//! use wiregen::extractor::{SourceExtractor, classify::DetectionRules, go::GoExtractor};
//! use std::path::Path;
//!
//! let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
//! let result = extractor.extract_file(Path::new("internal/user/handler.go"));
//! println!("Found {} handlers", result.handlers.len());
//! ```

pub mod annotation;
pub mod classify;
pub mod go;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Trait for extracting handler, route, and provider records from one source file.
///
/// Implementations must be shareable across worker threads; all detection tables are
/// owned by the implementation and never mutated during extraction.
pub trait SourceExtractor: Send + Sync {
    /// Extracts the raw declarations of a single file.
    ///
    /// Failures are reported inside the returned result as one [`ScanError`] with empty
    /// record collections, never as a panic or `Err`. Interface/implementation pairing is
    /// not applied here; see [`associate_implementations`].
    fn extract_file(&self, path: &Path) -> ScanResult;
}

/// HTTP methods accepted in route annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    /// Parses an annotation method token; only the fixed allow-list is accepted.
    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            "TRACE" => Some(HttpMethod::Trace),
            "CONNECT" => Some(HttpMethod::Connect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }

    /// Name of the Fiber router method registering this verb
    pub fn router_method(&self) -> &'static str {
        match self {
            HttpMethod::Get => "Get",
            HttpMethod::Post => "Post",
            HttpMethod::Put => "Put",
            HttpMethod::Delete => "Delete",
            HttpMethod::Patch => "Patch",
            HttpMethod::Head => "Head",
            HttpMethod::Options => "Options",
            HttpMethod::Trace => "Trace",
            HttpMethod::Connect => "Connect",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A method recognized as serving one request-route endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFunction {
    /// Method name, e.g. `GetUser`
    pub function_name: String,
    /// Declaring Go package name, e.g. `user`
    pub package: String,
    /// Receiver type name, or the interface name for interface-based records
    pub handler_name: String,
    /// Concrete implementing type; only set for interface-based records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementer_name: Option<String>,
    /// Whether the final return value is the error sentinel
    pub returns_error: bool,
    pub source_file: PathBuf,
    pub is_interface_based: bool,
}

/// One recognized route annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    /// Name of the annotated handler method
    pub method_name: String,
    /// Path exactly as annotated, e.g. `/users/{id}`
    pub path: String,
    pub http_method: HttpMethod,
    /// Field/method path reaching the handler at runtime, e.g. `userHandler.GetUser`
    pub handler_ref: String,
    pub package: String,
    pub source_file: PathBuf,
}

/// A free function supplying one constructed value to the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFunction {
    pub function_name: String,
    pub package: String,
    /// Primary return type spelling, e.g. `*Service` or `user.Handler`
    pub return_type: String,
    /// Parameter type spellings in declaration order
    pub parameters: Vec<String>,
    pub source_file: PathBuf,
}

/// A declared handler interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerInterface {
    pub interface_name: String,
    pub package: String,
    pub methods: Vec<String>,
    pub source_file: PathBuf,
}

/// A struct type that may implement a handler interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerImplementation {
    pub struct_name: String,
    pub package: String,
    /// Interface this struct was paired with, once association has run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
    pub source_file: PathBuf,
}

/// Category of a per-file scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanErrorKind {
    /// The file could not be parsed into a syntax tree
    ParseError,
    /// The file could not be read
    ReadError,
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanErrorKind::ParseError => f.write_str("parse_error"),
            ScanErrorKind::ReadError => f.write_str("read_error"),
        }
    }
}

/// A recoverable failure recorded for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub source_file: PathBuf,
    pub message: String,
    pub kind: ScanErrorKind,
}

/// Aggregate of every record found during one scan.
///
/// Collections carry no ordering guarantee; consumers that emit output sort first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub handlers: Vec<HandlerFunction>,
    pub routes: Vec<RouteMapping>,
    pub providers: Vec<ProviderFunction>,
    pub interfaces: Vec<HandlerInterface>,
    pub implementations: Vec<HandlerImplementation>,
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    /// Creates a result holding a single error and no records
    pub fn failed(source_file: &Path, kind: ScanErrorKind, message: String) -> Self {
        Self {
            errors: vec![ScanError {
                source_file: source_file.to_path_buf(),
                message,
                kind,
            }],
            ..Self::default()
        }
    }

    /// Moves every record of `other` into `self`
    pub fn merge(&mut self, other: ScanResult) {
        self.handlers.extend(other.handlers);
        self.routes.extend(other.routes);
        self.providers.extend(other.providers);
        self.interfaces.extend(other.interfaces);
        self.implementations.extend(other.implementations);
        self.errors.extend(other.errors);
    }
}

/// Pairs implementation structs with same-package handler interfaces.
///
/// This is the second of two passes: the first pass collects raw declarations, this one
/// reads them and returns a new result in which every paired implementation carries its
/// interface name, and every handler method found on a paired implementation is emitted
/// a second time as an interface-based record addressed by the interface name.
pub fn associate_implementations(raw: ScanResult, interface_name: &str) -> ScanResult {
    let implementations: Vec<HandlerImplementation> = raw
        .implementations
        .iter()
        .map(|imp| {
            let paired = raw
                .interfaces
                .iter()
                .any(|iface| iface.package == imp.package && iface.interface_name == interface_name);
            HandlerImplementation {
                interface_name: paired.then(|| interface_name.to_string()),
                ..imp.clone()
            }
        })
        .collect();

    let mut handlers = raw.handlers.clone();
    for handler in raw.handlers.iter().filter(|h| !h.is_interface_based) {
        let paired = implementations.iter().find(|imp| {
            imp.package == handler.package
                && imp.struct_name == handler.handler_name
                && imp.interface_name.is_some()
        });
        if let Some(imp) = paired {
            handlers.push(HandlerFunction {
                handler_name: interface_name.to_string(),
                implementer_name: Some(imp.struct_name.clone()),
                is_interface_based: true,
                ..handler.clone()
            });
        }
    }

    ScanResult {
        handlers,
        implementations,
        ..raw
    }
}
