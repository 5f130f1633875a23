use anyhow::{anyhow, Context, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// Syntax-tree parser for Go source files.
///
/// The `GoParser` uses tree-sitter with the Go grammar. Tree-sitter recovers from syntax
/// errors, so a tree containing error or missing nodes is rejected here and reported with
/// the position of the first problem.
///
/// # Example
///
/// ```no_run
/// use wiregen::parser::GoParser;
/// use std::path::Path;
///
/// let parsed = GoParser::parse_file(Path::new("internal/user/handler.go")).unwrap();
/// println!("package {}", parsed.package);
/// ```
pub struct GoParser;

/// A successfully parsed Go file with its syntax tree.
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Declared package name
    pub package: String,
    /// Full source text the tree refers into
    pub source: String,
    /// The parsed syntax tree
    pub tree: Tree,
}

impl ParsedFile {
    /// Source text spanned by a node
    pub fn text(&self, node: &Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

impl GoParser {
    /// Reads and parses a single Go source file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid Go syntax or no package clause
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        Self::parse_source(path, source)
    }

    /// Parses Go source text that was already read from `path`.
    pub fn parse_source(path: &Path, source: String) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .context("Failed to load the Go grammar")?;

        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| anyhow!("Failed to parse Go syntax in file: {}", path.display()))?;

        let root = tree.root_node();
        if root.has_error() {
            let location = first_error(root)
                .map(|n| {
                    let pos = n.start_position();
                    format!(" at line {}, column {}", pos.row + 1, pos.column + 1)
                })
                .unwrap_or_default();
            return Err(anyhow!(
                "Failed to parse Go syntax in file: {}: syntax error{}",
                path.display(),
                location
            ));
        }

        let package = package_name(root, &source).ok_or_else(|| {
            anyhow!(
                "Failed to parse Go syntax in file: {}: missing package clause",
                path.display()
            )
        })?;

        debug!("Successfully parsed file: {}", path.display());

        Ok(ParsedFile {
            path: path.to_path_buf(),
            package,
            source,
            tree,
        })
    }
}

/// Finds the first error or missing node in document order.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn package_name(root: Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    let clause = root
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_clause")?;

    let mut clause_cursor = clause.walk();
    let ident = clause
        .named_children(&mut clause_cursor)
        .find(|n| n.kind() == "package_identifier" || n.kind() == "identifier")?;

    ident
        .utf8_text(source.as_bytes())
        .ok()
        .map(|s| s.to_string())
}
