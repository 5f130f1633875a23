use crate::error::{Error, Result};
use crate::filter::normalize_path;
use crate::generator::format::FormatterKind;
use crate::generator::GeneratorSettings;
use crate::scanner::DEFAULT_WORKERS;
use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "wiregen.yaml";

/// Project configuration loaded from `wiregen.yaml`.
///
/// Every field is optional in the file; missing fields take their defaults.
///
/// # Example
///
/// ```yaml
/// project:
///   module: github.com/acme/shop
/// paths:
///   scan_dirs: ["./internal"]
///   output_dir: ./internal/api
/// generation:
///   routes:
///     output_file: routes_gen.go
///   formatter: gofmt
/// scan:
///   workers: 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub project: ProjectConfig,
    pub paths: PathsConfig,
    pub generation: GenerationConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Go module path; detected from `go.mod` when empty
    pub module: String,
    /// Project root; import paths are derived relative to it
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub scan_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub ignore_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub routes: RoutesConfig,
    pub dependencies: DependenciesConfig,
    /// Go package of the generated files; derived from `output_dir` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub formatter: FormatterKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    pub enabled: bool,
    pub output_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    pub enabled: bool,
    pub output_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Concurrent parses
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            project: ProjectConfig::default(),
            paths: PathsConfig::default(),
            generation: GenerationConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            module: String::new(),
            root: PathBuf::from("."),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scan_dirs: vec![PathBuf::from(".")],
            output_dir: PathBuf::from("."),
            ignore_file: PathBuf::from(".wiregenignore"),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            routes: RoutesConfig::default(),
            dependencies: DependenciesConfig::default(),
            package: None,
            formatter: FormatterKind::default(),
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_file: "routes_gen.go".to_string(),
        }
    }
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_file: "dependencies_gen.go".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Loads the configuration file, falling back to defaults when it does not exist.
    ///
    /// A relative project root is resolved against the directory holding the file (the
    /// working directory when there is no file) and, when no module is configured, the
    /// module path is read from the root's `go.mod`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if `go.mod`
    /// exists without a module directive.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let cwd = env::current_dir().context("Failed to determine the working directory")?;

        let (mut config, base) = if path.is_file() {
            debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let base = path.parent().map(|dir| cwd.join(dir)).unwrap_or(cwd);
            (Self::from_yaml(&content, path)?, base)
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            (Self::default(), cwd)
        };

        config.resolve(&base)?;
        Ok(config)
    }

    /// Parses configuration text; `path` is only used in error messages
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Makes the root absolute, clamps the pool size, and fills in the module path
    pub fn resolve(&mut self, base: &Path) -> anyhow::Result<()> {
        self.project.root = normalize_path(&base.join(&self.project.root));

        if self.scan.workers == 0 {
            warn!("scan.workers must be at least 1, using 1");
            self.scan.workers = 1;
        }

        if self.project.module.is_empty() {
            if let Some(module) = detect_go_module(&self.project.root)? {
                debug!("Detected Go module {}", module);
                self.project.module = module;
            }
        }

        Ok(())
    }

    /// Writes the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, content).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Scan roots resolved against the project root
    pub fn scan_dirs(&self) -> Vec<PathBuf> {
        self.paths
            .scan_dirs
            .iter()
            .map(|dir| normalize_path(&self.project.root.join(dir)))
            .collect()
    }

    /// Path of a generated file inside the output directory
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        normalize_path(
            &self
                .project
                .root
                .join(&self.paths.output_dir)
                .join(file_name),
        )
    }

    pub fn ignore_file(&self) -> PathBuf {
        normalize_path(&self.project.root.join(&self.paths.ignore_file))
    }

    /// Go package name of the generated files
    pub fn output_package(&self) -> String {
        if let Some(package) = self.generation.package.as_deref().filter(|p| !p.is_empty()) {
            return package.to_string();
        }

        let output_dir = normalize_path(&self.project.root.join(&self.paths.output_dir));
        output_dir
            .file_name()
            .map(|name| go_identifier(&name.to_string_lossy()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "main".to_string())
    }

    /// Settings shared by the route and dependency generators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingModule`] if no module path is configured or detected.
    pub fn generator_settings(&self) -> Result<GeneratorSettings> {
        if self.project.module.is_empty() {
            return Err(Error::MissingModule);
        }
        Ok(GeneratorSettings {
            project_root: self.project.root.clone(),
            module: self.project.module.clone(),
            output_dir: self.paths.output_dir.clone(),
            package: self.output_package(),
        })
    }
}

/// Lowercased directory name with characters invalid in Go identifiers replaced
fn go_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Reads the module path from `root/go.mod`.
///
/// Returns `Ok(None)` when there is no `go.mod`.
pub fn detect_go_module(root: &Path) -> anyhow::Result<Option<String>> {
    let go_mod = root.join("go.mod");
    if !go_mod.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&go_mod)
        .with_context(|| format!("Failed to read {}", go_mod.display()))?;

    for line in content.lines() {
        if let Some(rest) = line.trim().strip_prefix("module ") {
            let rest = rest.split("//").next().unwrap_or(rest);
            let module = rest.trim().trim_matches('"');
            if !module.is_empty() {
                return Ok(Some(module.to_string()));
            }
        }
    }

    anyhow::bail!(
        "Could not detect the Go module name from {}",
        go_mod.display()
    )
}
