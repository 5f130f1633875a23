//! Deterministic Go code generation for routes and dependency provider sets.
//!
//! Both generators take a completed scan, impose their own total order on the records
//! (aggregation order is arbitrary), render Go source, and hand it to
//! [`write_generated_file`], which formats and writes it.

pub mod dependencies;
pub mod format;
pub mod routes;

use crate::error::{Error, Result};
use crate::filter::normalize_path;
use format::SourceFormatter;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// First line of every generated file.
///
/// Follows the Go convention recognized by tooling (`^// Code generated .* DO NOT EDIT\.$`).
pub const GENERATED_MARKER: &str = "// Code generated by wiregen. DO NOT EDIT.";

/// Whether file content carries a generated-file marker
pub fn is_generated(content: &str) -> bool {
    content
        .lines()
        .any(|l| l.starts_with("// Code generated ") && l.ends_with(" DO NOT EDIT."))
}

/// Project facts shared by both generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSettings {
    /// Directory import paths are derived against
    pub project_root: PathBuf,
    /// Go module path, e.g. `github.com/acme/shop`
    pub module: String,
    /// Directory receiving the generated files
    pub output_dir: PathBuf,
    /// Go package name of the generated files
    pub package: String,
}

impl GeneratorSettings {
    /// Absolute (or root-relative) path of a generated file
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        normalize_path(&self.project_root.join(&self.output_dir).join(file_name))
    }

    /// Go import path of the package declared in `source_file`.
    ///
    /// The module path joined with the file's directory relative to the project root; a
    /// file outside the root falls back to its cleaned directory.
    pub fn import_path(&self, source_file: &Path) -> String {
        let dir = normalize_path(source_file.parent().unwrap_or_else(|| Path::new(".")));
        let root = normalize_path(&self.project_root);

        let relative = match dir.strip_prefix(&root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                debug!(
                    "{} is outside the project root {}",
                    dir.display(),
                    root.display()
                );
                dir
            }
        };

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            self.module.clone()
        } else {
            format!("{}/{}", self.module, segments.join("/"))
        }
    }

    /// Go import path of the package the generated files belong to
    pub fn output_import_path(&self) -> String {
        self.import_path(&self.output_path("generated.go"))
    }
}

/// Identifiers under which a generated file refers to its imported packages.
///
/// A package name declared by a single import path is used as is. When several paths
/// declare the same name, or the name is reserved in the generated file, each of those
/// paths gets its parent directory prepended (`v1user`, `v2user`) and a numeric suffix
/// if that is still taken.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ImportNames {
    by_path: BTreeMap<String, String>,
}

impl ImportNames {
    /// Assigns names to `(import path, package)` pairs
    pub(crate) fn assign<'a, I>(imports: I, reserved: &[&str]) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut paths_by_package: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (path, package) in imports {
            paths_by_package.entry(package).or_default().insert(path);
        }

        let mut taken: BTreeSet<String> = reserved.iter().map(|r| r.to_string()).collect();
        let mut by_path = BTreeMap::new();
        let mut colliding = Vec::new();

        for (package, paths) in &paths_by_package {
            match paths.first() {
                Some(path) if paths.len() == 1 && !taken.contains(*package) => {
                    taken.insert(package.to_string());
                    by_path.insert(path.to_string(), package.to_string());
                }
                _ => colliding.push((*package, paths)),
            }
        }

        for (package, paths) in colliding {
            for path in paths {
                let base = qualified_name(path, package);
                let mut name = base.clone();
                let mut counter = 2;
                while taken.contains(&name) {
                    name = format!("{}{}", base, counter);
                    counter += 1;
                }
                debug!(
                    "Package name {} is not unique, importing {} as {}",
                    package, path, name
                );
                taken.insert(name.clone());
                by_path.insert(path.to_string(), name);
            }
        }

        Self { by_path }
    }

    pub(crate) fn name(&self, import_path: &str) -> Option<&str> {
        self.by_path.get(import_path).map(String::as_str)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Import block lines, sorted by import path
    pub(crate) fn import_lines(&self) -> Vec<String> {
        self.by_path
            .iter()
            .map(|(path, name)| import_line(path, name))
            .collect()
    }
}

/// `package` prefixed with the import path's parent directory
fn qualified_name(import_path: &str, package: &str) -> String {
    let parent: String = import_path
        .rsplit('/')
        .nth(1)
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();

    if parent.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", package, parent)
    } else {
        format!("{}{}", parent, package)
    }
}

/// One line of a Go import block, aliased when the path's last element differs from the
/// package name.
pub(crate) fn import_line(import_path: &str, package: &str) -> String {
    let last = import_path.rsplit('/').next().unwrap_or(import_path);
    if last == package {
        format!("\t\"{}\"", import_path)
    } else {
        format!("\t{} \"{}\"", package, import_path)
    }
}

/// Formats and writes a generated file, creating parent directories.
///
/// A formatter failure is not fatal: the unformatted source is written and a warning is
/// logged so the output can be inspected.
///
/// # Errors
///
/// Returns [`Error::CreateDir`] or [`Error::Write`] naming the failing path.
pub fn write_generated_file(
    path: &Path,
    source: &str,
    formatter: &dyn SourceFormatter,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = match formatter.format(source) {
        Ok(formatted) => formatted,
        Err(e) => {
            warn!(
                "Failed to format {} with {}, writing unformatted output: {}",
                path.display(),
                formatter.name(),
                e
            );
            source.to_string()
        }
    };

    fs::write(path, content).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Wrote {}", path.display());
    Ok(())
}
