use crate::error::Result;
use crate::extractor::classify::handler_field_name;
use crate::extractor::{HandlerFunction, RouteMapping};
use crate::generator::format::SourceFormatter;
use crate::generator::{write_generated_file, GeneratorSettings, ImportNames, GENERATED_MARKER};
use log::info;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

const FIBER_IMPORT: &str = "github.com/gofiber/fiber/v2";

/// Rewrites `{name}` parameters to the router's `:name` form
pub fn normalize_route_path(path: &str) -> String {
    path.chars()
        .filter(|c| *c != '}')
        .map(|c| if c == '{' { ':' } else { c })
        .collect()
}

/// Ranks a normalized path so that longer and more static paths register first.
///
/// Each segment is worth 1000, plus 100 if static or minus 100 if it is a `:param` or
/// `*wildcard` segment. `/users/search` scores 2200 and `/users/:id` scores 2000.
pub fn specificity_score(path: &str) -> i64 {
    path.trim_matches('/')
        .split('/')
        .map(|segment| {
            if segment.starts_with(':') || segment.starts_with('*') {
                1000 - 100
            } else {
                1000 + 100
            }
        })
        .sum()
}

/// A route ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OrderedRoute<'a> {
    path: String,
    score: i64,
    import_path: String,
    route: &'a RouteMapping,
}

impl Ord for OrderedRoute<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| {
                self.route
                    .http_method
                    .as_str()
                    .cmp(other.route.http_method.as_str())
            })
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.route.handler_ref.cmp(&other.route.handler_ref))
            .then_with(|| self.route.source_file.cmp(&other.route.source_file))
    }
}

impl PartialOrd for OrderedRoute<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One `routeHandlers` field.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HandlerField {
    name: String,
    type_name: String,
}

/// Renders and writes the route registration file.
///
/// Input collections may arrive in any order; the rendered file depends only on their
/// contents. Duplicate routes are emitted as they are, never collapsed.
pub struct RouteGenerator {
    settings: GeneratorSettings,
    output_file: String,
    handler_suffix: String,
}

impl RouteGenerator {
    pub fn new(settings: GeneratorSettings, output_file: impl Into<String>) -> Self {
        Self {
            settings,
            output_file: output_file.into(),
            handler_suffix: "Handler".to_string(),
        }
    }

    /// Sets the suffix used to name handler fields, matching the scan's detection rules
    pub fn with_handler_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.handler_suffix = suffix.into();
        self
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings.output_path(&self.output_file)
    }

    /// Renders, formats, and writes the file, returning its path
    pub fn generate(
        &self,
        handlers: &[HandlerFunction],
        routes: &[RouteMapping],
        formatter: &dyn SourceFormatter,
    ) -> Result<PathBuf> {
        let path = self.output_path();
        let source = self.render(handlers, routes);
        write_generated_file(&path, &source, formatter)?;
        info!("Generated {} routes in {}", routes.len(), path.display());
        Ok(path)
    }

    /// Renders the unformatted Go source
    pub fn render(&self, handlers: &[HandlerFunction], routes: &[RouteMapping]) -> String {
        let mut ordered: Vec<OrderedRoute> = routes
            .iter()
            .map(|route| {
                let path = normalize_route_path(&route.path);
                OrderedRoute {
                    score: specificity_score(&path),
                    path,
                    import_path: self.settings.import_path(&route.source_file),
                    route,
                }
            })
            .collect();
        ordered.sort();

        let local = self.settings.output_import_path();
        let packages: BTreeMap<&str, &str> = ordered
            .iter()
            .filter(|entry| entry.import_path != local)
            .map(|entry| (entry.import_path.as_str(), entry.route.package.as_str()))
            .collect();
        let imports = ImportNames::assign(packages, &[self.settings.package.as_str(), "fiber"]);

        let fields = self.handler_fields(handlers, &ordered, &imports);

        let mut lines = vec![
            GENERATED_MARKER.to_string(),
            String::new(),
            format!("package {}", self.settings.package),
            String::new(),
            "import (".to_string(),
            format!("\t\"{}\"", FIBER_IMPORT),
        ];
        if !imports.is_empty() {
            lines.push(String::new());
            lines.extend(imports.import_lines());
        }
        lines.push(")".to_string());
        lines.push(String::new());

        lines.push(
            "// routeHandlers holds the handlers referenced by RegisterRoutes; embed it in Server."
                .to_string(),
        );
        lines.push("type routeHandlers struct {".to_string());
        lines.extend(
            fields
                .iter()
                .map(|field| format!("\t{} {}", field.name, field.type_name)),
        );
        lines.push("}".to_string());
        lines.push(String::new());

        lines.push("// RegisterRoutes registers every annotated handler on app.".to_string());
        lines.push("func (s *Server) RegisterRoutes(app *fiber.App) {".to_string());
        lines.extend(ordered.iter().map(|entry| {
            format!(
                "\tapp.{}(\"{}\", s.{}.{})",
                entry.route.http_method.router_method(),
                entry.path,
                self.field_name(entry, &imports),
                entry.route.method_name
            )
        }));
        lines.push("}".to_string());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Name of the field holding the handler of `entry`'s package directory
    fn field_name(&self, entry: &OrderedRoute, imports: &ImportNames) -> String {
        let package = imports
            .name(&entry.import_path)
            .unwrap_or(&entry.route.package);
        handler_field_name(package, &self.handler_suffix)
    }

    /// One field per package directory, sorted by field name
    fn handler_fields(
        &self,
        handlers: &[HandlerFunction],
        ordered: &[OrderedRoute],
        imports: &ImportNames,
    ) -> Vec<HandlerField> {
        let mut fields: BTreeMap<String, HandlerField> = BTreeMap::new();

        let mut sorted: Vec<&OrderedRoute> = ordered.iter().collect();
        sorted.sort_by(|a, b| {
            (&a.route.handler_ref, &a.route.source_file)
                .cmp(&(&b.route.handler_ref, &b.route.source_file))
        });

        for entry in sorted {
            let name = self.field_name(entry, imports);
            if fields.contains_key(&name) {
                continue;
            }

            let type_ident = self.handler_type_ident(handlers, entry);
            let type_name = type_ident.render(imports.name(&entry.import_path));
            fields.insert(name.clone(), HandlerField { name, type_name });
        }

        fields.into_values().collect()
    }

    /// The type a route's handler field is declared with
    fn handler_type_ident(&self, handlers: &[HandlerFunction], entry: &OrderedRoute) -> TypeIdent {
        let candidates: Vec<&HandlerFunction> = handlers
            .iter()
            .filter(|h| {
                h.function_name == entry.route.method_name
                    && h.package == entry.route.package
                    && self.settings.import_path(&h.source_file) == entry.import_path
            })
            .collect();

        if let Some(iface) = candidates.iter().find(|h| h.is_interface_based) {
            return TypeIdent::Interface(iface.handler_name.clone());
        }

        let mut names: Vec<&str> = candidates.iter().map(|h| h.handler_name.as_str()).collect();
        names.sort_unstable();
        match names.first() {
            Some(name) => TypeIdent::Pointer(name.to_string()),
            None => TypeIdent::Pointer(self.handler_suffix.clone()),
        }
    }
}

enum TypeIdent {
    Pointer(String),
    Interface(String),
}

impl TypeIdent {
    fn render(&self, package: Option<&str>) -> String {
        let (star, name) = match self {
            TypeIdent::Pointer(name) => ("*", name),
            TypeIdent::Interface(name) => ("", name),
        };
        match package {
            Some(pkg) => format!("{}{}.{}", star, pkg, name),
            None => format!("{}{}", star, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::HttpMethod;
    use crate::generator::format::BuiltinFormatter;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn settings(root: &Path) -> GeneratorSettings {
        GeneratorSettings {
            project_root: root.to_path_buf(),
            module: "github.com/acme/shop".to_string(),
            output_dir: PathBuf::from("internal/api"),
            package: "api".to_string(),
        }
    }

    fn handler(pkg: &str, name: &str, owner: &str, interface_based: bool) -> HandlerFunction {
        HandlerFunction {
            function_name: name.to_string(),
            package: pkg.to_string(),
            handler_name: owner.to_string(),
            implementer_name: interface_based.then(|| "HandlerImpl".to_string()),
            returns_error: true,
            source_file: PathBuf::from(format!("/work/shop/internal/{}/handler.go", pkg)),
            is_interface_based: interface_based,
        }
    }

    fn route(pkg: &str, name: &str, method: HttpMethod, path: &str) -> RouteMapping {
        RouteMapping {
            method_name: name.to_string(),
            path: path.to_string(),
            http_method: method,
            handler_ref: format!("{}.{}", handler_field_name(pkg, "Handler"), name),
            package: pkg.to_string(),
            source_file: PathBuf::from(format!("/work/shop/internal/{}/handler.go", pkg)),
        }
    }

    fn registration_lines(source: &str) -> Vec<String> {
        source
            .lines()
            .filter(|l| l.trim_start().starts_with("app."))
            .map(|l| l.trim().to_string())
            .collect()
    }

    #[test]
    fn test_normalize_route_path() {
        assert_eq!(normalize_route_path("/users/{id}/orders/{orderId}"), "/users/:id/orders/:orderId");
        assert_eq!(normalize_route_path("/health"), "/health");
    }

    #[test]
    fn test_specificity_scores() {
        assert_eq!(specificity_score("/users/search"), 2200);
        assert_eq!(specificity_score("/users/:id"), 2000);
        assert_eq!(specificity_score("/files/*"), 2000);
        assert!(specificity_score("/a/b/c") > specificity_score("/a/b"));
    }

    #[test]
    fn test_static_path_registered_before_parameter() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let handlers = vec![
            handler("user", "GetUser", "Handler", false),
            handler("user", "SearchUsers", "Handler", false),
        ];
        let routes = vec![
            route("user", "GetUser", HttpMethod::Get, "/users/{id}"),
            route("user", "SearchUsers", HttpMethod::Get, "/users/search"),
        ];

        let source = generator.render(&handlers, &routes);

        assert_eq!(
            registration_lines(&source),
            vec![
                "app.Get(\"/users/search\", s.userHandler.SearchUsers)",
                "app.Get(\"/users/:id\", s.userHandler.GetUser)",
            ]
        );
    }

    #[test]
    fn test_tie_break_by_method_then_path() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let routes = vec![
            route("user", "Update", HttpMethod::Put, "/users"),
            route("user", "List", HttpMethod::Get, "/users"),
            route("user", "Create", HttpMethod::Post, "/users"),
            route("order", "List", HttpMethod::Get, "/orders"),
        ];

        let source = generator.render(&[], &routes);

        assert_eq!(
            registration_lines(&source),
            vec![
                "app.Get(\"/orders\", s.orderHandler.List)",
                "app.Get(\"/users\", s.userHandler.List)",
                "app.Post(\"/users\", s.userHandler.Create)",
                "app.Put(\"/users\", s.userHandler.Update)",
            ]
        );
    }

    #[test]
    fn test_output_independent_of_input_order() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let handlers = vec![
            handler("user", "GetUser", "Handler", false),
            handler("order", "GetOrder", "HandlerImpl", false),
            handler("order", "GetOrder", "Handler", true),
            handler("product", "Search", "Handler", false),
        ];
        let routes = vec![
            route("user", "GetUser", HttpMethod::Get, "/users/{id}"),
            route("order", "GetOrder", HttpMethod::Get, "/orders/{id}"),
            route("product", "Search", HttpMethod::Get, "/products/search"),
        ];

        let forward = generator.render(&handlers, &routes);

        let mut rev_handlers = handlers.clone();
        rev_handlers.reverse();
        let mut rev_routes = routes.clone();
        rev_routes.rotate_left(1);
        let shuffled = generator.render(&rev_handlers, &rev_routes);

        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_rendered_file_layout() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let handlers = vec![
            handler("user", "GetUser", "Handler", false),
            handler("order", "GetOrder", "HandlerImpl", false),
            handler("order", "GetOrder", "Handler", true),
        ];
        let routes = vec![
            route("user", "GetUser", HttpMethod::Get, "/users/{id}"),
            route("order", "GetOrder", HttpMethod::Get, "/orders/{id}"),
        ];

        let source = BuiltinFormatter
            .format(&generator.render(&handlers, &routes))
            .unwrap();

        let expected = r#"// Code generated by wiregen. DO NOT EDIT.

package api

import (
	"github.com/gofiber/fiber/v2"

	"github.com/acme/shop/internal/order"
	"github.com/acme/shop/internal/user"
)

// routeHandlers holds the handlers referenced by RegisterRoutes; embed it in Server.
type routeHandlers struct {
	orderHandler order.Handler
	userHandler  *user.Handler
}

// RegisterRoutes registers every annotated handler on app.
func (s *Server) RegisterRoutes(app *fiber.App) {
	app.Get("/orders/:id", s.orderHandler.GetOrder)
	app.Get("/users/:id", s.userHandler.GetUser)
}
"#;
        assert_eq!(source, expected);
    }

    #[test]
    fn test_same_package_handler_is_unqualified() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let handlers = vec![handler("api", "Health", "Handler", false)];
        let routes = vec![route("api", "Health", HttpMethod::Get, "/health")];

        let source = generator.render(&handlers, &routes);

        assert!(source.contains("\tapiHandler *Handler\n"));
        assert!(!source.contains("github.com/acme/shop/internal/api\""));
    }

    #[test]
    fn test_duplicates_are_not_collapsed() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let routes = vec![
            route("user", "ListA", HttpMethod::Get, "/x"),
            route("order", "ListB", HttpMethod::Get, "/x"),
        ];

        let source = generator.render(&[], &routes);

        assert_eq!(
            registration_lines(&source),
            vec![
                "app.Get(\"/x\", s.orderHandler.ListB)",
                "app.Get(\"/x\", s.userHandler.ListA)",
            ]
        );
    }

    #[test]
    fn test_same_package_name_in_two_directories() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let mut v1 = route("user", "GetUser", HttpMethod::Get, "/v1/users/{id}");
        v1.source_file = PathBuf::from("/work/shop/internal/v1/user/handler.go");
        let mut v2 = route("user", "GetUser", HttpMethod::Get, "/v2/users/{id}");
        v2.source_file = PathBuf::from("/work/shop/internal/v2/user/handler.go");
        let mut v2_handler = handler("user", "GetUser", "Controller", false);
        v2_handler.source_file = v2.source_file.clone();

        let source = BuiltinFormatter
            .format(&generator.render(&[v2_handler], &[v2, v1]))
            .unwrap();

        assert!(source.contains("\tv1user \"github.com/acme/shop/internal/v1/user\"\n"));
        assert!(source.contains("\tv2user \"github.com/acme/shop/internal/v2/user\"\n"));
        assert!(source.contains("\tv1userHandler *v1user.Handler\n"));
        assert!(source.contains("\tv2userHandler *v2user.Controller\n"));
        assert_eq!(
            registration_lines(&source),
            vec![
                "app.Get(\"/v1/users/:id\", s.v1userHandler.GetUser)",
                "app.Get(\"/v2/users/:id\", s.v2userHandler.GetUser)",
            ]
        );
    }

    #[test]
    fn test_output_package_name_elsewhere_is_imported() {
        let generator = RouteGenerator::new(settings(Path::new("/work/shop")), "routes_gen.go");
        let mut legacy = route("api", "Health", HttpMethod::Get, "/health");
        legacy.source_file = PathBuf::from("/work/shop/legacy/api/handler.go");

        let source = generator.render(&[], &[legacy]);

        assert!(source.contains("\tlegacyapi \"github.com/acme/shop/legacy/api\"\n"));
        assert!(source.contains("\tlegacyapiHandler *legacyapi.Handler\n"));
        assert!(source.contains("s.legacyapiHandler.Health"));
    }

    #[test]
    fn test_generate_writes_marked_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let generator = RouteGenerator::new(settings(root), "routes_gen.go");
        let mut r = route("user", "GetUser", HttpMethod::Get, "/users/{id}");
        r.source_file = root.join("internal/user/handler.go");

        let path = generator.generate(&[], &[r], &BuiltinFormatter).unwrap();

        assert_eq!(path, root.join("internal/api/routes_gen.go"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(GENERATED_MARKER));
        assert!(content.contains("github.com/acme/shop/internal/user"));
    }
}
