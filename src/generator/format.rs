use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Canonical formatting pass applied to generated source before it is written.
pub trait SourceFormatter: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Returns the formatted source, or [`Error::Format`] if the input cannot be formatted
    fn format(&self, source: &str) -> Result<String>;
}

/// Formatter selection in the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterKind {
    #[default]
    Builtin,
    Gofmt,
}

impl FormatterKind {
    pub fn formatter(&self) -> Box<dyn SourceFormatter> {
        match self {
            FormatterKind::Builtin => Box::new(BuiltinFormatter),
            FormatterKind::Gofmt => Box::new(FallbackFormatter::new(
                GofmtFormatter::default(),
                BuiltinFormatter,
            )),
        }
    }
}

/// Project-local deterministic pretty-printer for generated Go.
///
/// Re-indents every line with tabs according to its `{}`/`()`/`[]` nesting, trims
/// trailing whitespace, collapses runs of blank lines, and ends the file with exactly one
/// newline. Delimiters inside strings, runes, and comments are ignored; the content of
/// multi-line raw strings is kept verbatim.
///
/// Struct fields are aligned into columns the way gofmt aligns them: a run of consecutive
/// `name Type` lines pads every name to the widest one plus a space, and tags get their
/// own column the same way. Blank lines, comments, embedded fields, and fields with an
/// inline struct type end a run.
pub struct BuiltinFormatter;

/// One output line before struct alignment
struct OutputLine {
    depth: usize,
    text: String,
    /// False for raw string content and block comment continuations
    code: bool,
}

/// Lexical state carried from one line to the next
#[derive(Clone, Copy, PartialEq, Eq)]
enum Carry {
    Code,
    BlockComment,
    RawString,
}

impl SourceFormatter for BuiltinFormatter {
    fn name(&self) -> &str {
        "builtin"
    }

    fn format(&self, source: &str) -> Result<String> {
        let mut lines: Vec<OutputLine> = Vec::new();
        let mut stack: Vec<(char, usize)> = Vec::new();
        let mut carry = Carry::Code;
        let mut blank_pending = false;

        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;

            if carry == Carry::RawString {
                lines.push(OutputLine {
                    depth: 0,
                    text: line.to_string(),
                    code: false,
                });
                carry = scan_line(line, carry, &mut stack, line_no)?;
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                blank_pending = !lines.is_empty();
                continue;
            }
            if blank_pending {
                lines.push(OutputLine {
                    depth: 0,
                    text: String::new(),
                    code: true,
                });
                blank_pending = false;
            }

            let indent = if carry == Carry::BlockComment {
                stack.len()
            } else {
                let leading_closers = trimmed
                    .chars()
                    .take_while(|c| matches!(c, ')' | '}' | ']'))
                    .count();
                stack.len().saturating_sub(leading_closers)
            };

            lines.push(OutputLine {
                depth: indent,
                text: trimmed.to_string(),
                code: carry == Carry::Code,
            });

            carry = scan_line(trimmed, carry, &mut stack, line_no)?;
        }

        if let Some((open, line_no)) = stack.last() {
            return Err(Error::Format(format!(
                "unclosed '{}' opened at line {}",
                open, line_no
            )));
        }
        if carry != Carry::Code {
            return Err(Error::Format(
                "unterminated comment or raw string".to_string(),
            ));
        }

        Ok(align_struct_fields(&lines, source.len()))
    }
}

/// Renders the lines, padding struct field runs into columns
fn align_struct_fields(lines: &[OutputLine], capacity: usize) -> String {
    let mut out = String::with_capacity(capacity);
    let mut open_structs: Vec<usize> = Vec::new();
    let mut run: Vec<(usize, Vec<&str>)> = Vec::new();

    for line in lines {
        let field = if line.code && open_structs.last() == Some(&line.depth.saturating_sub(1)) {
            field_cells(&line.text)
        } else {
            None
        };

        match field {
            Some(cells) if line.depth > 0 => run.push((line.depth, cells)),
            _ => {
                flush_field_run(&mut out, &mut run);
                push_indented(&mut out, line.depth, &line.text);
            }
        }

        if !line.code {
            continue;
        }
        if line.text.ends_with("struct {") {
            open_structs.push(line.depth);
        } else if line.text.starts_with('}') && open_structs.last() == Some(&line.depth) {
            open_structs.pop();
        }
    }
    flush_field_run(&mut out, &mut run);

    out
}

/// Splits a field declaration into name, type, and optional tag
fn field_cells(text: &str) -> Option<Vec<&str>> {
    if text.contains("//") || text.contains("/*") {
        return None;
    }
    let (name, rest) = text.split_once(char::is_whitespace)?;
    let is_ident = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    let rest = rest.trim_start();
    if !is_ident || rest.is_empty() || rest.contains('{') {
        return None;
    }

    match rest.find('`') {
        Some(0) => None,
        Some(tag_start) => Some(vec![name, rest[..tag_start].trim_end(), &rest[tag_start..]]),
        None => Some(vec![name, rest]),
    }
}

fn flush_field_run(out: &mut String, run: &mut Vec<(usize, Vec<&str>)>) {
    let rows: Vec<&[&str]> = run.iter().map(|(_, cells)| cells.as_slice()).collect();
    let mut widths = vec![Vec::new(); rows.len()];
    column_widths(&rows, 0, 0, rows.len(), &mut widths);

    for ((depth, cells), widths) in run.iter().zip(&widths) {
        let mut text = String::new();
        for (column, cell) in cells.iter().enumerate() {
            text.push_str(cell);
            if let Some(width) = widths.get(column) {
                let padding = width.saturating_sub(cell.chars().count());
                text.extend(std::iter::repeat(' ').take(padding));
            }
        }
        push_indented(out, *depth, &text);
    }
    run.clear();
}

/// Assigns a width to every non-final cell of `column`.
///
/// A column block is a maximal run of rows that have a cell after `column`; each block is
/// as wide as its widest cell plus one space, and the next column is sized within it.
fn column_widths(
    rows: &[&[&str]],
    column: usize,
    start: usize,
    end: usize,
    widths: &mut [Vec<usize>],
) {
    let mut row = start;
    while row < end {
        if rows[row].len() <= column + 1 {
            row += 1;
            continue;
        }
        let block_start = row;
        while row < end && rows[row].len() > column + 1 {
            row += 1;
        }
        let width = rows[block_start..row]
            .iter()
            .map(|cells| cells[column].chars().count())
            .max()
            .unwrap_or(0)
            + 1;
        for row_widths in &mut widths[block_start..row] {
            row_widths.push(width);
        }
        column_widths(rows, column + 1, block_start, row, widths);
    }
}

fn push_indented(out: &mut String, depth: usize, text: &str) {
    if !text.is_empty() {
        for _ in 0..depth {
            out.push('\t');
        }
        out.push_str(text);
    }
    out.push('\n');
}

/// Tracks delimiter nesting over one line, skipping literals and comments
fn scan_line(
    line: &str,
    mut carry: Carry,
    stack: &mut Vec<(char, usize)>,
    line_no: usize,
) -> Result<Carry> {
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match carry {
            Carry::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    carry = Carry::Code;
                }
            }
            Carry::RawString => {
                if c == '`' {
                    carry = Carry::Code;
                }
            }
            Carry::Code => match c {
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    carry = Carry::BlockComment;
                }
                '`' => carry = Carry::RawString,
                '"' | '\'' => skip_quoted(&mut chars, c),
                '(' | '{' | '[' => stack.push((c, line_no)),
                ')' | '}' | ']' => {
                    let expected = match c {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        Some((open, opened_at)) => {
                            return Err(Error::Format(format!(
                                "'{}' at line {} does not close '{}' from line {}",
                                c, line_no, open, opened_at
                            )))
                        }
                        None => {
                            return Err(Error::Format(format!(
                                "unbalanced '{}' at line {}",
                                c, line_no
                            )))
                        }
                    }
                }
                _ => {}
            },
        }
    }

    Ok(carry)
}

fn skip_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, quote: char) {
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            return;
        }
    }
}

/// Uses `primary` and switches to `fallback` when it fails.
pub struct FallbackFormatter {
    primary: Box<dyn SourceFormatter>,
    fallback: Box<dyn SourceFormatter>,
}

impl FallbackFormatter {
    pub fn new(
        primary: impl SourceFormatter + 'static,
        fallback: impl SourceFormatter + 'static,
    ) -> Self {
        Self {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }
    }
}

impl SourceFormatter for FallbackFormatter {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn format(&self, source: &str) -> Result<String> {
        match self.primary.format(source) {
            Ok(formatted) => Ok(formatted),
            Err(e) => {
                warn!(
                    "{} failed ({}), formatting with {}",
                    self.primary.name(),
                    e,
                    self.fallback.name()
                );
                self.fallback.format(source)
            }
        }
    }
}

/// Formats through the external `gofmt` binary.
pub struct GofmtFormatter {
    binary: PathBuf,
}

impl Default for GofmtFormatter {
    fn default() -> Self {
        Self::new("gofmt")
    }
}

impl GofmtFormatter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl SourceFormatter for GofmtFormatter {
    fn name(&self) -> &str {
        "gofmt"
    }

    fn format(&self, source: &str) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Format(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| Error::Format(format!("failed to write to gofmt: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Format(format!("gofmt did not finish: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Format(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| Error::Format(format!("gofmt produced invalid UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn format(source: &str) -> Result<String> {
        BuiltinFormatter.format(source)
    }

    #[test]
    fn test_reindents_by_nesting() {
        let source = "package api\n\n\n\nimport (\n    \"fmt\"\n)\n\nfunc f() {\n  if x {\n        g(\"}\")   \n  } else {\n h()\n }\n}";
        let expected = "package api\n\nimport (\n\t\"fmt\"\n)\n\nfunc f() {\n\tif x {\n\t\tg(\"}\")\n\t} else {\n\t\th()\n\t}\n}\n";
        assert_eq!(format(source).unwrap(), expected);
    }

    #[test]
    fn test_ignores_delimiters_in_comments_and_runes() {
        let source = "var x = []rune{\n'{', // not ( a delimiter\n/* ) */ '}',\n}\n";
        let expected = "var x = []rune{\n\t'{', // not ( a delimiter\n\t/* ) */ '}',\n}\n";
        assert_eq!(format(source).unwrap(), expected);
    }

    #[test]
    fn test_raw_string_kept_verbatim() {
        let source = "var q = `\n  select {\n`\nvar y = 1\n";
        assert_eq!(format(source).unwrap(), source);
    }

    #[test]
    fn test_idempotent() {
        let once = format("func f() {\ng()\n}\n\n\n").unwrap();
        assert_eq!(format(&once).unwrap(), once);
    }

    #[test]
    fn test_unbalanced_is_format_error() {
        assert!(matches!(format("func f() {\n"), Err(Error::Format(_))));
        assert!(matches!(format("}\n"), Err(Error::Format(_))));
        assert!(matches!(format("f(]\n"), Err(Error::Format(_))));
    }

    #[test]
    fn test_missing_gofmt_binary_is_format_error() {
        let formatter = GofmtFormatter::new("/nonexistent/bin/gofmt");
        assert!(matches!(
            formatter.format("package api\n"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_struct_fields_aligned_like_gofmt() {
        let source = "type routeHandlers struct {\norderHandler order.Handler\nproductHandler   *product.Handler\nid string `json:\"id\"`\n\nName  string `json:\"name\"`\nFullName string\n*Base\nx int\n}\n\nfunc f() {\nab := 1\n}\n";
        let expected = "type routeHandlers struct {\n\torderHandler   order.Handler\n\tproductHandler *product.Handler\n\tid             string `json:\"id\"`\n\n\tName     string `json:\"name\"`\n\tFullName string\n\t*Base\n\tx int\n}\n\nfunc f() {\n\tab := 1\n}\n";
        assert_eq!(format(source).unwrap(), expected);
        assert_eq!(format(expected).unwrap(), expected);
    }

    #[test]
    fn test_nested_struct_fields_aligned_per_level() {
        let source = "var cfg struct {\nLongName int\n\nInner struct {\na int\nbbb string\n}\n}\n";
        let expected = "var cfg struct {\n\tLongName int\n\n\tInner struct {\n\t\ta   int\n\t\tbbb string\n\t}\n}\n";
        assert_eq!(format(source).unwrap(), expected);
    }

    #[test]
    fn test_gofmt_kind_falls_back_to_builtin() {
        let formatter =
            FallbackFormatter::new(GofmtFormatter::new("/nonexistent/bin/gofmt"), BuiltinFormatter);
        assert_eq!(formatter.name(), "gofmt");
        assert_eq!(
            formatter.format("type s struct {\na int\nbb int\n}\n").unwrap(),
            "type s struct {\n\ta  int\n\tbb int\n}\n"
        );
        assert!(matches!(
            formatter.format("func f() {\n"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_formatter_kind_from_yaml() {
        let kind: FormatterKind = serde_yaml::from_str("gofmt").unwrap();
        assert_eq!(kind, FormatterKind::Gofmt);
        assert_eq!(FormatterKind::default().formatter().name(), "builtin");
    }
}
