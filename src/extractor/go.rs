use crate::extractor::annotation::{comment_lines, RouteAnnotationParser};
use crate::extractor::classify::{
    handler_field_name, DetectionRules, HandlerClassifier, SuffixHeuristic,
};
use crate::extractor::{
    associate_implementations, HandlerFunction, HandlerImplementation, HandlerInterface,
    ProviderFunction, RouteMapping, ScanErrorKind, ScanResult, SourceExtractor,
};
use crate::parser::{GoParser, ParsedFile};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;
use tree_sitter::Node;

/// Go source extractor.
///
/// Purely syntactic: declarations are classified by their shape and names, nothing is
/// type-checked. One extractor is shared by all scan workers.
pub struct GoExtractor {
    rules: DetectionRules,
    classifier: Box<dyn HandlerClassifier>,
    annotations: RouteAnnotationParser,
}

impl GoExtractor {
    /// Creates an extractor for the given conventions with the default name heuristic
    pub fn new(rules: DetectionRules) -> Result<Self> {
        let annotations =
            RouteAnnotationParser::new("@Router").context("Failed to compile route patterns")?;
        let classifier = Box::new(SuffixHeuristic::new(rules.handler_suffix.clone()));
        Ok(Self {
            rules,
            classifier,
            annotations,
        })
    }

    /// Replaces the handler-role predicate
    pub fn with_classifier(mut self, classifier: impl HandlerClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn rules(&self) -> &DetectionRules {
        &self.rules
    }

    /// Extracts one file and pairs its interfaces with its implementations.
    ///
    /// Suitable for single-file use; scans over many files should pair once after merging
    /// (see [`crate::scanner::Scanner`]).
    pub fn scan_file(&self, path: &Path) -> ScanResult {
        associate_implementations(self.extract_file(path), &self.rules.handler_interface)
    }

    /// Extracts raw declarations from an already parsed file
    pub fn extract_parsed(&self, parsed: &ParsedFile) -> ScanResult {
        let mut result = ScanResult::default();
        let root = parsed.tree.root_node();

        let mut cursor = root.walk();
        let items: Vec<Node> = root.named_children(&mut cursor).collect();
        for item in items {
            match item.kind() {
                "method_declaration" => self.process_method(parsed, item, &mut result),
                "function_declaration" => self.process_function(parsed, item, &mut result),
                "type_declaration" => self.process_type_decl(parsed, item, &mut result),
                _ => {}
            }
        }

        debug!(
            "{}: {} handlers, {} routes, {} providers",
            parsed.path.display(),
            result.handlers.len(),
            result.routes.len(),
            result.providers.len()
        );

        result
    }

    /// Check a method declaration for the handler signature and its route annotation
    fn process_method(&self, parsed: &ParsedFile, method: Node, result: &mut ScanResult) {
        let Some(handler) = self.extract_handler(parsed, method) else {
            return;
        };

        if let Some(route) = self.extract_route(parsed, method, &handler) {
            result.routes.push(route);
        }
        result.handlers.push(handler);
    }

    fn extract_handler(&self, parsed: &ParsedFile, method: Node) -> Option<HandlerFunction> {
        let receiver = method.child_by_field_name("receiver")?;
        let handler_name = self.receiver_type_name(parsed, receiver)?;

        if !self.classifier.is_handler_type(&handler_name) {
            return None;
        }

        if !self.is_handler_signature(
            parsed,
            method.child_by_field_name("parameters"),
            method.child_by_field_name("result"),
        ) {
            return None;
        }

        let name = method.child_by_field_name("name")?;
        Some(HandlerFunction {
            function_name: parsed.text(&name).to_string(),
            package: parsed.package.clone(),
            handler_name,
            implementer_name: None,
            returns_error: true,
            source_file: parsed.path.clone(),
            is_interface_based: false,
        })
    }

    /// Parse the `@Router` annotation in the method's doc comment
    fn extract_route(
        &self,
        parsed: &ParsedFile,
        method: Node,
        handler: &HandlerFunction,
    ) -> Option<RouteMapping> {
        let docs = doc_comments(parsed, method);
        if docs.is_empty() {
            return None;
        }

        let lines = comment_lines(&docs);
        let (path, http_method) = self.annotations.parse_lines(lines.iter().map(String::as_str))?;

        Some(RouteMapping {
            method_name: handler.function_name.clone(),
            path,
            http_method,
            handler_ref: format!(
                "{}.{}",
                handler_field_name(&handler.package, &self.rules.handler_suffix),
                handler.function_name
            ),
            package: handler.package.clone(),
            source_file: handler.source_file.clone(),
        })
    }

    /// Check a free function for the provider naming convention
    fn process_function(&self, parsed: &ParsedFile, function: Node, result: &mut ScanResult) {
        if let Some(provider) = self.extract_provider(parsed, function) {
            result.providers.push(provider);
        }
    }

    fn extract_provider(&self, parsed: &ParsedFile, function: Node) -> Option<ProviderFunction> {
        let name = parsed.text(&function.child_by_field_name("name")?).to_string();
        if !self.rules.is_provider_name(&name) {
            return None;
        }

        let results = result_types(function.child_by_field_name("result"));
        let first = results.first()?;
        let mut return_type = type_string(parsed, *first);
        if return_type.is_empty() {
            return None;
        }

        // (Handler, error) is the interface pattern; qualify so it reads unambiguously
        if return_type == self.rules.handler_interface
            && results.len() == 2
            && self.is_error_type(parsed, results[1])
        {
            return_type = format!("{}.{}", parsed.package, return_type);
        }

        let parameters = function
            .child_by_field_name("parameters")
            .map(|params| {
                parameter_decls(params)
                    .into_iter()
                    .flat_map(|decl| {
                        let spelled = decl.type_node.map(|t| decl.spell(parsed, t));
                        std::iter::repeat(spelled.unwrap_or_default()).take(decl.names.max(1))
                    })
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Some(ProviderFunction {
            function_name: name,
            package: parsed.package.clone(),
            return_type,
            parameters,
            source_file: parsed.path.clone(),
        })
    }

    /// Check type specs for handler interfaces and implementation structs
    fn process_type_decl(&self, parsed: &ParsedFile, decl: Node, result: &mut ScanResult) {
        let mut cursor = decl.walk();
        let specs: Vec<Node> = decl
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "type_spec")
            .collect();

        for spec in specs {
            let (Some(name), Some(ty)) = (
                spec.child_by_field_name("name"),
                spec.child_by_field_name("type"),
            ) else {
                continue;
            };
            let type_name = parsed.text(&name).to_string();

            match ty.kind() {
                "interface_type" => {
                    if let Some(methods) = self.handler_interface_methods(parsed, &type_name, ty) {
                        result.interfaces.push(HandlerInterface {
                            interface_name: type_name,
                            package: parsed.package.clone(),
                            methods,
                            source_file: parsed.path.clone(),
                        });
                    }
                }
                "struct_type" => {
                    if self.classifier.is_implementation_type(&type_name) {
                        result.implementations.push(HandlerImplementation {
                            struct_name: type_name,
                            package: parsed.package.clone(),
                            interface_name: None,
                            source_file: parsed.path.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }

    /// Returns the interface's method names if it is a handler interface
    fn handler_interface_methods(
        &self,
        parsed: &ParsedFile,
        name: &str,
        iface: Node,
    ) -> Option<Vec<String>> {
        if name != self.rules.handler_interface {
            return None;
        }

        let mut cursor = iface.walk();
        let elems: Vec<Node> = iface
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "method_elem" || n.kind() == "method_spec")
            .collect();

        let has_handler_method = elems.iter().any(|m| {
            self.is_handler_signature(
                parsed,
                m.child_by_field_name("parameters"),
                m.child_by_field_name("result"),
            )
        });
        if !has_handler_method {
            return None;
        }

        Some(
            elems
                .iter()
                .filter_map(|m| m.child_by_field_name("name"))
                .map(|n| parsed.text(&n).to_string())
                .collect(),
        )
    }

    /// A single request-context parameter and a trailing error result
    fn is_handler_signature(
        &self,
        parsed: &ParsedFile,
        params: Option<Node>,
        result: Option<Node>,
    ) -> bool {
        let Some(params) = params else {
            return false;
        };
        let decls = parameter_decls(params);
        let [decl] = decls.as_slice() else {
            return false;
        };
        if decl.names > 1 || decl.variadic {
            return false;
        }
        let Some(param_type) = decl.type_node else {
            return false;
        };
        if !self.is_context_type(parsed, param_type) {
            return false;
        }

        result_types(result)
            .last()
            .is_some_and(|last| self.is_error_type(parsed, *last))
    }

    fn is_context_type(&self, parsed: &ParsedFile, ty: Node) -> bool {
        if ty.kind() != "pointer_type" {
            return false;
        }
        let Some(inner) = first_named_child(ty) else {
            return false;
        };
        if inner.kind() != "qualified_type" {
            return false;
        }
        match (
            inner.child_by_field_name("package"),
            inner.child_by_field_name("name"),
        ) {
            (Some(pkg), Some(name)) => self
                .rules
                .is_context_type(parsed.text(&pkg), parsed.text(&name)),
            _ => false,
        }
    }

    fn is_error_type(&self, parsed: &ParsedFile, ty: Node) -> bool {
        ty.kind() == "type_identifier" && parsed.text(&ty) == self.rules.error_type
    }

    /// Receiver type name for `(h *Name)` or `(h Name)`
    fn receiver_type_name(&self, parsed: &ParsedFile, receiver: Node) -> Option<String> {
        let decls = parameter_decls(receiver);
        let [decl] = decls.as_slice() else {
            return None;
        };
        let ty = decl.type_node?;
        let ident = match ty.kind() {
            "pointer_type" => first_named_child(ty)?,
            "type_identifier" => ty,
            _ => return None,
        };
        (ident.kind() == "type_identifier").then(|| parsed.text(&ident).to_string())
    }
}

impl SourceExtractor for GoExtractor {
    fn extract_file(&self, path: &Path) -> ScanResult {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                return ScanResult::failed(
                    path,
                    ScanErrorKind::ReadError,
                    format!("Failed to read file: {}: {}", path.display(), e),
                )
            }
        };

        match GoParser::parse_source(path, source) {
            Ok(parsed) => self.extract_parsed(&parsed),
            Err(e) => ScanResult::failed(path, ScanErrorKind::ParseError, e.to_string()),
        }
    }
}

/// One entry of a Go parameter list
struct ParamDecl<'t> {
    /// Number of declared names; 0 for unnamed parameters
    names: usize,
    type_node: Option<Node<'t>>,
    variadic: bool,
}

impl ParamDecl<'_> {
    fn spell(&self, parsed: &ParsedFile, ty: Node) -> String {
        let spelled = type_string(parsed, ty);
        if self.variadic {
            format!("...{}", spelled)
        } else {
            spelled
        }
    }
}

fn parameter_decls(list: Node) -> Vec<ParamDecl> {
    let mut cursor = list.walk();
    let decls: Vec<Node> = list.named_children(&mut cursor).collect();

    decls
        .into_iter()
        .filter_map(|decl| {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => return None,
            };
            let mut name_cursor = decl.walk();
            let names = decl.children_by_field_name("name", &mut name_cursor).count();
            Some(ParamDecl {
                names,
                type_node: decl.child_by_field_name("type"),
                variadic,
            })
        })
        .collect()
}

/// Result types in order, one entry per declared result name
fn result_types(result: Option<Node>) -> Vec<Node> {
    let Some(result) = result else {
        return Vec::new();
    };
    if result.kind() != "parameter_list" {
        return vec![result];
    }

    parameter_decls(result)
        .into_iter()
        .filter_map(|decl| decl.type_node.map(|t| (t, decl.names.max(1))))
        .flat_map(|(t, n)| std::iter::repeat(t).take(n))
        .collect()
}

/// Spells a type expression, e.g. `*Service`, `[]string`, `map[string]*user.User`
fn type_string(parsed: &ParsedFile, ty: Node) -> String {
    match ty.kind() {
        "type_identifier" | "identifier" | "package_identifier" => parsed.text(&ty).to_string(),
        "pointer_type" => first_named_child(ty)
            .map(|inner| format!("*{}", type_string(parsed, inner)))
            .unwrap_or_default(),
        "qualified_type" => match (
            ty.child_by_field_name("package"),
            ty.child_by_field_name("name"),
        ) {
            (Some(pkg), Some(name)) => format!("{}.{}", parsed.text(&pkg), parsed.text(&name)),
            _ => collapse_whitespace(parsed.text(&ty)),
        },
        "slice_type" => ty
            .child_by_field_name("element")
            .map(|e| format!("[]{}", type_string(parsed, e)))
            .unwrap_or_default(),
        "array_type" => match (
            ty.child_by_field_name("length"),
            ty.child_by_field_name("element"),
        ) {
            (Some(len), Some(e)) => format!("[{}]{}", parsed.text(&len), type_string(parsed, e)),
            _ => collapse_whitespace(parsed.text(&ty)),
        },
        "map_type" => match (
            ty.child_by_field_name("key"),
            ty.child_by_field_name("value"),
        ) {
            (Some(k), Some(v)) => {
                format!("map[{}]{}", type_string(parsed, k), type_string(parsed, v))
            }
            _ => collapse_whitespace(parsed.text(&ty)),
        },
        "parenthesized_type" => first_named_child(ty)
            .map(|inner| type_string(parsed, inner))
            .unwrap_or_default(),
        _ => collapse_whitespace(parsed.text(&ty)),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next();
    first
}

/// Raw text of the comments directly above a declaration, top to bottom.
///
/// The run ends at the first non-comment sibling, at a blank line, or at a comment
/// trailing code on its own line.
fn doc_comments<'p>(parsed: &'p ParsedFile, decl: Node) -> Vec<&'p str> {
    let mut comments = Vec::new();
    let mut next_row = decl.start_position().row;
    let mut current = decl.prev_sibling();

    while let Some(node) = current {
        if node.kind() != "comment" || node.end_position().row + 1 < next_row {
            break;
        }
        let previous = node.prev_sibling();
        if previous.is_some_and(|p| p.end_position().row == node.start_position().row) {
            break;
        }
        comments.push(parsed.text(&node));
        next_row = node.start_position().row;
        current = previous;
    }

    comments.reverse();
    comments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::HttpMethod;
    use std::path::PathBuf;

    fn extract(code: &str) -> ScanResult {
        let parsed = GoParser::parse_source(Path::new("internal/user/handler.go"), code.to_string())
            .unwrap();
        let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
        associate_implementations(extractor.extract_parsed(&parsed), "Handler")
    }

    #[test]
    fn test_extract_annotated_handler() {
        let code = r#"
package widgets

import "github.com/gofiber/fiber/v2"

type Handler struct{}

// CreateWidget creates a widget
// @Summary Create a widget
// @Router /api/v1/widgets [post]
func (h *Handler) CreateWidget(c *fiber.Ctx) error {
	return nil
}
"#;
        let result = extract(code);

        assert_eq!(result.handlers.len(), 1);
        assert_eq!(result.routes.len(), 1);
        let handler = &result.handlers[0];
        assert_eq!(handler.function_name, "CreateWidget");
        assert_eq!(handler.package, "widgets");
        assert_eq!(handler.handler_name, "Handler");
        assert!(handler.returns_error);

        let route = &result.routes[0];
        assert_eq!(route.http_method, HttpMethod::Post);
        assert_eq!(route.path, "/api/v1/widgets");
        assert_eq!(route.handler_ref, "widgetsHandler.CreateWidget");
        assert_eq!(route.method_name, "CreateWidget");
    }

    #[test]
    fn test_gin_context_and_value_receiver() {
        let code = r#"
package user

func (h UserHandler) List(c *gin.Context) error { return nil }
"#;
        let result = extract(code);
        assert_eq!(result.handlers.len(), 1);
        assert_eq!(result.handlers[0].handler_name, "UserHandler");
        assert!(result.routes.is_empty());
    }

    #[test]
    fn test_rejects_non_handler_shapes() {
        let code = r#"
package user

type Handler struct{}
type Service struct{}

func (s *Service) Get(c *fiber.Ctx) error { return nil }
func (h *Handler) NoError(c *fiber.Ctx) { }
func (h *Handler) TwoParams(c *fiber.Ctx, id string) error { return nil }
func (h *Handler) WrongParam(r *http.Request) error { return nil }
func (h *Handler) ValueCtx(c fiber.Ctx) error { return nil }
func Free(c *fiber.Ctx) error { return nil }
"#;
        let result = extract(code);
        assert!(result.handlers.is_empty(), "found {:?}", result.handlers);
    }

    #[test]
    fn test_detached_comment_is_not_documentation() {
        let code = r#"
package user

// @Router /detached [get]

func (h *Handler) Detached(c *fiber.Ctx) error { return nil }
"#;
        let result = extract(code);
        assert_eq!(result.handlers.len(), 1);
        assert!(result.routes.is_empty());
    }

    #[test]
    fn test_trailing_comment_is_not_documentation() {
        let code = r#"
package user

var x = 1 // @Router /stolen [get]
func (h *Handler) Get(c *fiber.Ctx) error { return nil }

var y = 2 // unrelated
// @Router /kept [get]
func (h *Handler) Kept(c *fiber.Ctx) error { return nil }
"#;
        let result = extract(code);
        assert_eq!(result.handlers.len(), 2);
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].path, "/kept");
        assert_eq!(result.routes[0].method_name, "Kept");
    }

    #[test]
    fn test_multiple_results_ending_in_error() {
        let code = r#"
package user

// @Router /users/{id} [get]
func (h *Handler) Lookup(c *fiber.Ctx) (n int, err error) { return 0, nil }
"#;
        let result = extract(code);
        assert_eq!(result.handlers.len(), 1);
        assert_eq!(result.routes[0].path, "/users/{id}");
    }

    #[test]
    fn test_extract_provider_types() {
        let code = r#"
package user

func ProvideService(repo *Repository, log *zap.Logger, tags []string, idx map[string]*User, opts ...Option) *Service {
	return nil
}

func ProvideRepository(a, b string) (*Repository, error) {
	return nil, nil
}

func ProvideNothing() {}

func helper() *Service { return nil }
"#;
        let result = extract(code);

        assert_eq!(result.providers.len(), 2);
        let service = result
            .providers
            .iter()
            .find(|p| p.function_name == "ProvideService")
            .unwrap();
        assert_eq!(service.return_type, "*Service");
        assert_eq!(
            service.parameters,
            vec!["*Repository", "*zap.Logger", "[]string", "map[string]*User", "...Option"]
        );
        assert_eq!(service.source_file, PathBuf::from("internal/user/handler.go"));

        let repo = result
            .providers
            .iter()
            .find(|p| p.function_name == "ProvideRepository")
            .unwrap();
        assert_eq!(repo.return_type, "*Repository");
        assert_eq!(repo.parameters, vec!["string", "string"]);
    }

    #[test]
    fn test_interface_provider_is_qualified() {
        let code = r#"
package order

func ProvideHandler(svc *Service) (Handler, error) {
	return &HandlerImpl{svc: svc}, nil
}

func ProvideBare() Handler { return nil }
"#;
        let result = extract(code);
        let qualified = result
            .providers
            .iter()
            .find(|p| p.function_name == "ProvideHandler")
            .unwrap();
        assert_eq!(qualified.return_type, "order.Handler");
        let bare = result
            .providers
            .iter()
            .find(|p| p.function_name == "ProvideBare")
            .unwrap();
        assert_eq!(bare.return_type, "Handler");
    }

    #[test]
    fn test_interface_and_implementation_pairing() {
        let code = r#"
package order

type Handler interface {
	GetOrder(c *fiber.Ctx) error
	Close()
}

type HandlerImpl struct {
	svc *Service
}

// @Router /orders/{id} [get]
func (h *HandlerImpl) GetOrder(c *fiber.Ctx) error { return nil }
"#;
        let result = extract(code);

        assert_eq!(result.interfaces.len(), 1);
        assert_eq!(result.interfaces[0].methods, vec!["GetOrder", "Close"]);
        assert_eq!(result.implementations.len(), 1);
        assert_eq!(
            result.implementations[0].interface_name.as_deref(),
            Some("Handler")
        );

        assert_eq!(result.handlers.len(), 2);
        assert!(result
            .handlers
            .iter()
            .any(|h| h.is_interface_based && h.handler_name == "Handler"));
        assert!(result
            .handlers
            .iter()
            .any(|h| !h.is_interface_based && h.handler_name == "HandlerImpl"));
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].handler_ref, "orderHandler.GetOrder");
    }

    #[test]
    fn test_non_handler_interface_ignored() {
        let code = r#"
package order

type Handler interface {
	Close() error
}

type Repository interface {
	Get(c *fiber.Ctx) error
}
"#;
        let result = extract(code);
        assert!(result.interfaces.is_empty());
    }

    #[test]
    fn test_grouped_type_declaration() {
        let code = r#"
package order

type (
	Handler interface {
		Create(c *fiber.Ctx) error
	}
	orderImpl struct{}
)
"#;
        let result = extract(code);
        assert_eq!(result.interfaces.len(), 1);
        assert_eq!(result.implementations.len(), 1);
        assert_eq!(result.implementations[0].struct_name, "orderImpl");
    }

    struct ExplicitNames;

    impl HandlerClassifier for ExplicitNames {
        fn is_handler_type(&self, type_name: &str) -> bool {
            type_name == "Endpoints"
        }

        fn is_implementation_type(&self, _type_name: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_custom_classifier() {
        let code = r#"
package user

func (e *Endpoints) Ping(c *fiber.Ctx) error { return nil }
func (h *Handler) Pong(c *fiber.Ctx) error { return nil }
"#;
        let parsed = GoParser::parse_source(Path::new("user.go"), code.to_string()).unwrap();
        let extractor = GoExtractor::new(DetectionRules::default())
            .unwrap()
            .with_classifier(ExplicitNames);
        let result = extractor.extract_parsed(&parsed);

        assert_eq!(result.handlers.len(), 1);
        assert_eq!(result.handlers[0].function_name, "Ping");
    }

    #[test]
    fn test_extract_file_reports_parse_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.go");
        fs::write(&path, "package user\n\nfunc (h *Handler) Broken(c *fiber.Ctx error {\n").unwrap();

        let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
        let result = extractor.extract_file(&path);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ScanErrorKind::ParseError);
        assert!(result.handlers.is_empty());
        assert!(result.providers.is_empty());
    }

    #[test]
    fn test_extract_file_reports_read_error() {
        let extractor = GoExtractor::new(DetectionRules::default()).unwrap();
        let result = extractor.extract_file(Path::new("/nonexistent/handler.go"));

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ScanErrorKind::ReadError);
    }
}
