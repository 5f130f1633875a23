//! wiregen - Route registration and dependency wiring generated from Go sources.
//!
//! This library statically analyzes a Go project with tree-sitter. It finds HTTP handler
//! methods annotated with `@Router` comments and `Provide*` constructor functions, then
//! renders two deterministic Go files: one registering every route on a Fiber app and one
//! aggregating every provider into a Wire provider set.
//!
//! # Architecture
//!
//! 1. [`filter`] - Walks scan roots and applies the ignore patterns
//! 2. [`parser`] - Parses Go files into syntax trees
//! 3. [`extractor`] - Extracts handlers, routes, and providers from one file
//! 4. [`scanner`] - Runs the extractor over all candidate files concurrently
//! 5. [`validator`] - Checks the scan for duplicates, bad paths, and orphans
//! 6. [`generator`] - Renders and writes the Go files
//! 7. [`serializer`] - Renders scan reports as text, YAML, or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use wiregen::{
//!     extractor::{classify::DetectionRules, go::GoExtractor},
//!     filter::IgnoreFilter,
//!     generator::{format::BuiltinFormatter, routes::RouteGenerator, GeneratorSettings},
//!     scanner::Scanner,
//!     validator::validate_scan_result,
//! };
//! use std::path::PathBuf;
//!
//! let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
//! let scanner = Scanner::new(extractor, IgnoreFilter::new());
//! let result = scanner.scan_all(&[PathBuf::from("./internal")]).unwrap();
//!
//! let validation = validate_scan_result(&result, "Handler");
//! assert!(!validation.has_errors());
//!
//! let settings = GeneratorSettings {
//!     project_root: PathBuf::from("."),
//!     module: "github.com/acme/shop".to_string(),
//!     output_dir: PathBuf::from("internal/api"),
//!     package: "api".to_string(),
//! };
//! RouteGenerator::new(settings, "routes_gen.go")
//!     .generate(&result.handlers, &result.routes, &BuiltinFormatter)
//!     .unwrap();
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod generator;
pub mod parser;
pub mod scanner;
pub mod serializer;
pub mod validator;
