//! Naming conventions that decide which Go declarations fill the handler and provider roles.

/// Predicate deciding whether a declared type name fills the handler role.
///
/// The default [`SuffixHeuristic`] is intentionally permissive; a stricter implementation
/// (for example one keyed on an explicit marker) can be swapped in through
/// [`GoExtractor::with_classifier`](crate::extractor::go::GoExtractor::with_classifier).
pub trait HandlerClassifier: Send + Sync {
    /// Whether methods on this receiver type may be handlers
    fn is_handler_type(&self, type_name: &str) -> bool;

    /// Whether a struct with this name is a candidate implementation of a handler interface
    fn is_implementation_type(&self, type_name: &str) -> bool;
}

/// Default name-suffix classification.
#[derive(Debug, Clone)]
pub struct SuffixHeuristic {
    handler_suffix: String,
}

impl SuffixHeuristic {
    pub fn new(handler_suffix: impl Into<String>) -> Self {
        Self {
            handler_suffix: handler_suffix.into(),
        }
    }
}

impl Default for SuffixHeuristic {
    fn default() -> Self {
        Self::new("Handler")
    }
}

impl HandlerClassifier for SuffixHeuristic {
    fn is_handler_type(&self, type_name: &str) -> bool {
        type_name.ends_with(&self.handler_suffix) || self.is_implementation_type(type_name)
    }

    fn is_implementation_type(&self, type_name: &str) -> bool {
        type_name == format!("{}Impl", self.handler_suffix)
            || type_name.ends_with("Implementation")
            || type_name.ends_with("Impl")
            || (type_name.ends_with(&self.handler_suffix) && type_name.contains("Impl"))
    }
}

/// A qualified Go type such as `fiber.Ctx`, matched behind a pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedType {
    pub package: String,
    pub name: String,
}

impl QualifiedType {
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
        }
    }
}

/// Fixed conventions used by the Go extractor.
///
/// Owned by the extractor and read-only during a scan.
#[derive(Debug, Clone)]
pub struct DetectionRules {
    /// Accepted request-context parameter types (always behind a pointer)
    pub context_types: Vec<QualifiedType>,
    /// Name of the error sentinel type
    pub error_type: String,
    /// Suffix naming conventional handler receiver types
    pub handler_suffix: String,
    /// Name prefix of provider functions
    pub provider_prefix: String,
    /// Name of the handler interface in the interface + implementation pattern
    pub handler_interface: String,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            context_types: vec![
                QualifiedType::new("fiber", "Ctx"),
                QualifiedType::new("gin", "Context"),
            ],
            error_type: "error".to_string(),
            handler_suffix: "Handler".to_string(),
            provider_prefix: "Provide".to_string(),
            handler_interface: "Handler".to_string(),
        }
    }
}

impl DetectionRules {
    pub fn is_context_type(&self, package: &str, name: &str) -> bool {
        self.context_types
            .iter()
            .any(|t| t.package == package && t.name == name)
    }

    pub fn is_provider_name(&self, function_name: &str) -> bool {
        function_name.starts_with(&self.provider_prefix)
    }
}

/// Field name used to reach a package's handler instance, e.g. `user` -> `userHandler`.
pub fn handler_field_name(package: &str, handler_suffix: &str) -> String {
    let joined = format!("{}{}", package, handler_suffix);
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => joined,
    }
}
