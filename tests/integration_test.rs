use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wiregen::{
    cli::{run_clean, run_generate, run_scan, GenerateTarget, OutputFormat},
    config::Config,
    error::Error,
    extractor::{classify::DetectionRules, go::GoExtractor, ScanErrorKind},
    filter::{ensure_ignore_file, IgnoreFileStatus, IgnoreFilter},
    generator::GENERATED_MARKER,
    scanner::{ScanStatistics, Scanner},
    validator::{validate_scan_result, ValidationKind},
};

const CONFIG: &str = "\
project:
  root: .
paths:
  scan_dirs: [\".\"]
  output_dir: internal/api
";

const EXPECTED_ROUTES: &str = r#"// Code generated by wiregen. DO NOT EDIT.

package api

import (
	"github.com/gofiber/fiber/v2"

	"github.com/acme/shop/internal/order"
	"github.com/acme/shop/internal/product"
	"github.com/acme/shop/internal/user"
)

// routeHandlers holds the handlers referenced by RegisterRoutes; embed it in Server.
type routeHandlers struct {
	orderHandler   order.Handler
	productHandler *product.Handler
	userHandler    *user.Handler
}

// RegisterRoutes registers every annotated handler on app.
func (s *Server) RegisterRoutes(app *fiber.App) {
	app.Get("/products/search", s.productHandler.Search)
	app.Delete("/products/:id", s.productHandler.DeleteProduct)
	app.Get("/orders/:id", s.orderHandler.GetOrder)
	app.Get("/products/:id", s.productHandler.GetProduct)
	app.Get("/users/:id", s.userHandler.GetUser)
	app.Get("/users", s.userHandler.ListUsers)
	app.Post("/users", s.userHandler.CreateUser)
}
"#;

const EXPECTED_DEPENDENCIES: &str = r#"// Code generated by wiregen. DO NOT EDIT.

package api

import (
	"github.com/google/wire"

	"github.com/acme/shop/internal/order"
	"github.com/acme/shop/internal/product"
	"github.com/acme/shop/internal/user"
)

// GeneratedProviderSet aggregates every discovered provider.
var GeneratedProviderSet = wire.NewSet(
	// order
	order.ProvideHandler,

	// product
	product.ProvideHandler,

	// user
	user.ProvideHandler,
	user.ProvideRepository,
	user.ProvideService,
)
"#;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

/// A Go module with user, product, and order packages plus files that must be skipped
fn create_shop_project() -> TempDir {
    create_test_project(vec![
        ("go.mod", "module github.com/acme/shop\n\ngo 1.22\n"),
        ("wiregen.yaml", CONFIG),
        ("internal/user/handler.go", include_str!("fixtures/user_handler.go")),
        ("internal/user/service.go", include_str!("fixtures/user_service.go")),
        (
            "internal/user/handler_test.go",
            include_str!("fixtures/user_handler_test.go"),
        ),
        (
            "internal/product/handler.go",
            include_str!("fixtures/product_handler.go"),
        ),
        ("internal/order/handler.go", include_str!("fixtures/order_handler.go")),
        ("internal/broken/broken.go", include_str!("fixtures/broken.go")),
        (
            "vendor/github.com/acme/lib/handler.go",
            include_str!("fixtures/vendored_handler.go"),
        ),
    ])
}

fn load_config(root: &Path) -> Config {
    Config::load(Some(&root.join("wiregen.yaml"))).expect("Failed to load config")
}

fn build_scanner(config: &Config) -> Scanner {
    let extractor = GoExtractor::new(DetectionRules::default()).expect("Failed to build extractor");
    let filter = IgnoreFilter::load(&config.ignore_file()).expect("Failed to load ignore file");
    Scanner::new(extractor, filter).workers(config.scan.workers)
}

#[test]
fn test_scan_fixture_project() {
    let project = create_shop_project();
    let config = load_config(project.path());

    let result = build_scanner(&config)
        .scan_all(&config.scan_dirs())
        .expect("Failed to scan project");

    let mut route_paths: Vec<_> = result.routes.iter().map(|r| r.path.as_str()).collect();
    route_paths.sort_unstable();
    assert_eq!(
        route_paths,
        vec![
            "/orders/{id}",
            "/products/search",
            "/products/{id}",
            "/products/{id}",
            "/users",
            "/users",
            "/users/{id}",
        ]
    );

    let mut providers: Vec<_> = result
        .providers
        .iter()
        .map(|p| format!("{}.{}", p.package, p.function_name))
        .collect();
    providers.sort();
    assert_eq!(
        providers,
        vec![
            "order.ProvideHandler",
            "product.ProvideHandler",
            "user.ProvideHandler",
            "user.ProvideRepository",
            "user.ProvideService",
        ]
    );

    let order_provider = result
        .providers
        .iter()
        .find(|p| p.package == "order")
        .unwrap();
    assert_eq!(order_provider.return_type, "order.Handler");
    let service_provider = result
        .providers
        .iter()
        .find(|p| p.function_name == "ProvideService")
        .unwrap();
    assert_eq!(service_provider.parameters, vec!["*Repository", "*zap.Logger"]);

    // Seven annotated methods plus the interface-based record for order
    assert_eq!(result.handlers.len(), 8);
    assert_eq!(
        result.handlers.iter().filter(|h| h.is_interface_based).count(),
        1
    );
    assert_eq!(result.interfaces.len(), 1);
    assert_eq!(
        result.implementations[0].interface_name.as_deref(),
        Some("Handler")
    );

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ScanErrorKind::ParseError);
    assert!(result.errors[0].source_file.ends_with("internal/broken/broken.go"));

    let stats = ScanStatistics::from_result(&result);
    assert_eq!(stats.handlers_found, 7);
    assert_eq!(stats.routes_found, 7);
    assert_eq!(stats.providers_found, 5);
    assert_eq!(stats.errors_found, 1);
}

#[test]
fn test_ignored_files_are_not_scanned() {
    let project = create_shop_project();
    let config = load_config(project.path());

    let files = build_scanner(&config)
        .candidate_files(&config.scan_dirs())
        .expect("Failed to list candidate files");

    assert!(files.iter().all(|f| !f.to_string_lossy().contains("vendor")));
    assert!(files
        .iter()
        .all(|f| !f.to_string_lossy().ends_with("_test.go")));
    assert_eq!(files.len(), 5);
}

#[test]
fn test_validation_of_fixture_project() {
    let project = create_shop_project();
    let config = load_config(project.path());
    let result = build_scanner(&config)
        .scan_all(&config.scan_dirs())
        .expect("Failed to scan project");

    let validation = validate_scan_result(&result, "Handler");

    assert!(!validation.has_errors(), "{:?}", validation.errors);
    assert_eq!(validation.warnings.len(), 1);
    assert_eq!(validation.warnings[0].kind, ValidationKind::NamingConvention);
    assert_eq!(
        validation.warnings[0].handler.as_deref(),
        Some("order.GetOrder")
    );
}

#[test]
fn test_generate_end_to_end() {
    let project = create_shop_project();
    let config = load_config(project.path());

    let outcome =
        run_generate(&config, GenerateTarget::All, false).expect("Failed to generate files");

    let routes_file = outcome.routes_file.expect("Routes file should be written");
    let dependencies_file = outcome
        .dependencies_file
        .expect("Dependencies file should be written");
    assert_eq!(
        routes_file,
        project.path().join("internal/api/routes_gen.go")
    );
    assert_eq!(
        dependencies_file,
        project.path().join("internal/api/dependencies_gen.go")
    );

    assert_eq!(fs::read_to_string(routes_file).unwrap(), EXPECTED_ROUTES);
    assert_eq!(
        fs::read_to_string(dependencies_file).unwrap(),
        EXPECTED_DEPENDENCIES
    );
}

#[test]
fn test_generate_single_target() {
    let project = create_shop_project();
    let config = load_config(project.path());

    let outcome =
        run_generate(&config, GenerateTarget::Deps, false).expect("Failed to generate files");

    assert!(outcome.routes_file.is_none());
    assert!(outcome.dependencies_file.is_some());
    assert!(!project.path().join("internal/api/routes_gen.go").exists());
}

#[test]
fn test_generation_is_deterministic_across_worker_counts() {
    let project = create_shop_project();
    let mut config = load_config(project.path());
    let routes_path = project.path().join("internal/api/routes_gen.go");
    let dependencies_path = project.path().join("internal/api/dependencies_gen.go");

    for workers in [1, 2, 3, 8, 16] {
        config.scan.workers = workers;
        run_generate(&config, GenerateTarget::All, false).expect("Failed to generate files");

        assert_eq!(
            fs::read_to_string(&routes_path).unwrap(),
            EXPECTED_ROUTES,
            "routes differ with {} workers",
            workers
        );
        assert_eq!(
            fs::read_to_string(&dependencies_path).unwrap(),
            EXPECTED_DEPENDENCIES,
            "dependencies differ with {} workers",
            workers
        );
    }
}

#[test]
fn test_generate_refuses_duplicate_routes_unless_forced() {
    let project = create_shop_project();
    fs::create_dir_all(project.path().join("internal/admin")).unwrap();
    fs::write(
        project.path().join("internal/admin/handler.go"),
        r#"package admin

type Handler struct{}

// @Router /users/:id [get]
func (h *Handler) GetUser(c *fiber.Ctx) error { return nil }
"#,
    )
    .unwrap();
    let config = load_config(project.path());

    let err = run_generate(&config, GenerateTarget::All, false).unwrap_err();
    assert!(err.to_string().contains("Validation failed with 2 errors"));
    assert!(!project.path().join("internal/api/routes_gen.go").exists());

    let outcome = run_generate(&config, GenerateTarget::Routes, true).unwrap();
    let content = fs::read_to_string(outcome.routes_file.unwrap()).unwrap();
    assert!(content.contains("app.Get(\"/users/:id\", s.adminHandler.GetUser)"));
    assert!(content.contains("app.Get(\"/users/:id\", s.userHandler.GetUser)"));
}

#[test]
fn test_generate_requires_module() {
    let project = create_test_project(vec![
        ("wiregen.yaml", CONFIG),
        ("internal/user/handler.go", include_str!("fixtures/user_handler.go")),
    ]);
    let config = load_config(project.path());

    let err = run_generate(&config, GenerateTarget::All, false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingModule)
    ));
}

#[test]
fn test_user_ignore_patterns() {
    let project = create_shop_project();
    let config = load_config(project.path());

    assert_eq!(
        ensure_ignore_file(&config.ignore_file(), false).unwrap(),
        IgnoreFileStatus::Created
    );
    let mut content = fs::read_to_string(config.ignore_file()).unwrap();
    content.push_str("internal/product/**\n");
    fs::write(config.ignore_file(), content).unwrap();

    let result = build_scanner(&config)
        .scan_all(&config.scan_dirs())
        .expect("Failed to scan project");

    assert!(result.routes.iter().all(|r| r.package != "product"));
    assert!(result.providers.iter().all(|p| p.package != "product"));
    assert_eq!(result.routes.len(), 4);
}

#[test]
fn test_clean_removes_only_generated_files() {
    let project = create_shop_project();
    let config = load_config(project.path());
    run_generate(&config, GenerateTarget::All, false).expect("Failed to generate files");

    let manual = project.path().join("internal/api/routes_gen.go");
    fs::write(&manual, "package api\n\n// maintained by hand\n").unwrap();

    let removed = run_clean(&config).expect("Failed to clean");

    assert_eq!(
        removed,
        vec![project.path().join("internal/api/dependencies_gen.go")]
    );
    assert!(manual.exists());
}

#[test]
fn test_scan_report_formats() {
    let project = create_shop_project();
    let config = load_config(project.path());

    let json = run_scan(&config, OutputFormat::Json).expect("Failed to render JSON");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["statistics"]["routes_found"], 7);
    assert_eq!(parsed["scan"]["errors"][0]["kind"], "parse_error");

    let yaml = run_scan(&config, OutputFormat::Yaml).expect("Failed to render YAML");
    assert!(yaml.contains("providers_found: 5"));

    let text = run_scan(&config, OutputFormat::Text).expect("Failed to render text");
    assert!(text.contains("GET     /products/search -> productHandler.Search"));
    assert!(text.contains("[naming_convention]"));
    assert!(!text.contains(GENERATED_MARKER));
}
