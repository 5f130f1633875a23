use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Patterns applied before any user-supplied pattern.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "vendor/**",
    "node_modules/**",
    ".git/**",
    ".task/**",
    "bin/**",
    "build/**",
    "dist/**",
    "**/*_test.go",
    "**/*_mock.go",
    "**/testdata/**",
    "**/*_gen.go",
];

/// Content written by [`ensure_ignore_file`] when no ignore file exists yet.
pub const DEFAULT_IGNORE_FILE: &str = "\
# wiregen ignore patterns
# Files and directories matching these patterns are not scanned for handlers or providers.
# `*` matches within one path segment, `**` across segments, `!` re-includes a path.

# Dependencies and vendor code
vendor/**
node_modules/**

# Build artifacts
bin/**
build/**
dist/**
*.exe
*.so

# Tool and metadata directories
.git/**
.task/**
.vscode/**
.idea/**

# Test files and test data
**/*_test.go
**/*_mock.go
**/testdata/**
**/mocks/**

# Generated code
**/*_gen.go

# Logs and temporary files
*.log
tmp/**
";

/// One parsed ignore-file line.
struct IgnoreRule {
    matchers: Vec<GlobMatcher>,
    negated: bool,
    /// Leading path segments free of glob syntax, e.g. `internal/user` for `internal/user/**`
    literal_prefix: Vec<String>,
}

impl IgnoreRule {
    fn matches(&self, candidates: &[String]) -> bool {
        candidates
            .iter()
            .any(|c| self.matchers.iter().any(|m| m.is_match(c)))
    }
}

/// Content-independent filter deciding which files are scanned.
///
/// Rules are evaluated in order and the last matching rule wins, so a `!pattern` line can
/// re-include a path excluded by an earlier pattern. A rule matches a path if it matches the
/// path itself or any of its ancestor directories.
///
/// # Example
///
/// ```no_run
/// use wiregen::filter::IgnoreFilter;
/// use std::path::Path;
///
/// let filter = IgnoreFilter::load(Path::new(".wiregenignore")).unwrap();
/// let candidates = filter.find_candidate_files(Path::new("./internal")).unwrap();
/// println!("Found {} Go files", candidates.files.len());
/// ```
pub struct IgnoreFilter {
    rules: Vec<IgnoreRule>,
}

/// Result of walking one scan root.
pub struct CandidateFiles {
    /// Accepted `.go` files, sorted by path
    pub files: Vec<PathBuf>,
    /// Directories whose subtree was skipped, relative to the root
    pub pruned: Vec<PathBuf>,
    /// Warning messages for entries that could not be read
    pub warnings: Vec<String>,
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl IgnoreFilter {
    /// Creates a filter holding only the built-in patterns
    pub fn new() -> Self {
        let mut filter = Self::empty();
        for pattern in DEFAULT_IGNORE_PATTERNS {
            filter.add_pattern(pattern);
        }
        filter
    }

    /// Creates a filter without any patterns
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Creates a filter from the built-in patterns followed by the ignore file's patterns.
    ///
    /// A missing ignore file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the ignore file exists but cannot be read.
    pub fn load(ignore_file: &Path) -> Result<Self> {
        let mut filter = Self::new();
        if ignore_file.is_file() {
            let content = fs::read_to_string(ignore_file).with_context(|| {
                format!("Failed to read ignore file: {}", ignore_file.display())
            })?;
            let added = filter.add_patterns(&content);
            debug!(
                "Loaded {} patterns from {}",
                added,
                ignore_file.display()
            );
        }
        Ok(filter)
    }

    /// Adds every pattern line of an ignore file's content, returning how many were accepted
    pub fn add_patterns(&mut self, content: &str) -> usize {
        content
            .lines()
            .filter(|line| self.add_pattern(line))
            .count()
    }

    /// Adds one pattern line.
    ///
    /// Blank lines and `#` comments are skipped; an invalid glob is skipped with a warning.
    /// Returns whether a rule was added.
    pub fn add_pattern(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return false;
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };
        let pattern = normalize_pattern(pattern);
        if pattern.is_empty() {
            return false;
        }

        let mut globs = vec![pattern.to_string()];
        // `dir/**` also names `dir` itself so the walker can prune there
        if let Some(prefix) = pattern.strip_suffix("/**") {
            if !prefix.is_empty() {
                globs.push(prefix.to_string());
            }
        }

        let mut matchers = Vec::with_capacity(globs.len());
        for glob in &globs {
            match GlobBuilder::new(glob).literal_separator(true).build() {
                Ok(g) => matchers.push(g.compile_matcher()),
                Err(e) => {
                    warn!("Skipping invalid ignore pattern '{}': {}", line, e);
                    return false;
                }
            }
        }

        self.rules.push(IgnoreRule {
            matchers,
            negated,
            literal_prefix: literal_prefix(pattern),
        });
        true
    }

    /// Whether the walker may skip an ignored directory's whole subtree.
    ///
    /// A directory cannot be pruned while a `!` rule could re-include something below it,
    /// that is when the rule's literal prefix lies under the directory or contains it.
    fn can_prune(&self, relative_dir: &Path) -> bool {
        let dir: Vec<String> = path_segments(relative_dir);
        !self.rules.iter().filter(|rule| rule.negated).any(|rule| {
            let shared = rule.literal_prefix.len().min(dir.len());
            rule.literal_prefix[..shared] == dir[..shared]
        })
    }

    /// Whether a path relative to the scan root is excluded
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let candidates = path_and_ancestors(relative);
        if candidates.is_empty() {
            return false;
        }

        let mut ignored = false;
        for rule in &self.rules {
            if rule.matches(&candidates) {
                ignored = !rule.negated;
            }
        }
        ignored
    }

    /// Recursively collects every non-ignored `.go` file under `root`.
    ///
    /// Ignored directories are pruned unless a `!` rule could re-include something below
    /// them; pruned contents are never visited. Entries that cannot be read are recorded
    /// as warnings and the walk continues.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory.
    pub fn find_candidate_files(&self, root: &Path) -> Result<CandidateFiles> {
        if !root.is_dir() {
            bail!("Scan root is not a directory: {}", root.display());
        }

        let mut files = Vec::new();
        let mut pruned = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let Ok(relative) = e.path().strip_prefix(root) else {
                    return true;
                };
                if self.is_ignored(relative) && self.can_prune(relative) {
                    debug!("Pruning ignored directory: {}", e.path().display());
                    pruned.push(relative.to_path_buf());
                    return false;
                }
                true
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !entry.file_type().is_file()
                        || path.extension().and_then(|s| s.to_str()) != Some("go")
                    {
                        continue;
                    }
                    let relative = path.strip_prefix(root).unwrap_or(path);
                    if !self.is_ignored(relative) {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        files.sort();

        Ok(CandidateFiles {
            files,
            pruned,
            warnings,
        })
    }
}

fn normalize_pattern(pattern: &str) -> &str {
    let pattern = pattern.trim_end_matches('/');
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    pattern.trim_start_matches('/')
}

/// Segments of a pattern before the first one containing glob syntax
fn literal_prefix(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .take_while(|segment| !segment.contains(['*', '?', '[', '{']))
        .map(str::to_string)
        .collect()
}

fn path_segments(relative: &Path) -> Vec<String> {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// `a/b/c.go` -> `["a/b/c.go", "a/b", "a"]`, with `/` separators on every platform
fn path_and_ancestors(relative: &Path) -> Vec<String> {
    let parts = path_segments(relative);

    (1..=parts.len())
        .rev()
        .map(|n| parts[..n].join("/"))
        .collect()
}

/// Lexically normalizes a path: drops `.` components and resolves `..` against preceding
/// components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Outcome of [`ensure_ignore_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreFileStatus {
    /// A new file with the default content was written
    Created,
    /// The existing file was left untouched
    Unchanged,
    /// This many missing default patterns were appended
    Merged(usize),
}

/// Materializes the default ignore file.
///
/// Idempotent: an existing file is never overwritten. With `merge`, built-in patterns
/// missing from the existing file are appended to it.
pub fn ensure_ignore_file(path: &Path, merge: bool) -> Result<IgnoreFileStatus> {
    if !path.exists() {
        fs::write(path, DEFAULT_IGNORE_FILE)
            .with_context(|| format!("Failed to write ignore file: {}", path.display()))?;
        return Ok(IgnoreFileStatus::Created);
    }

    if !merge {
        return Ok(IgnoreFileStatus::Unchanged);
    }

    let existing = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ignore file: {}", path.display()))?;
    let present: HashSet<&str> = existing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    let missing: Vec<&str> = DEFAULT_IGNORE_PATTERNS
        .iter()
        .copied()
        .filter(|p| !present.contains(p))
        .collect();

    if missing.is_empty() {
        return Ok(IgnoreFileStatus::Unchanged);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("\n# Added by wiregen\n");
    for pattern in &missing {
        content.push_str(pattern);
        content.push('\n');
    }
    fs::write(path, content)
        .with_context(|| format!("Failed to write ignore file: {}", path.display()))?;

    Ok(IgnoreFileStatus::Merged(missing.len()))
}
