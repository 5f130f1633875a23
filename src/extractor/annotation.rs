use crate::extractor::HttpMethod;
use regex::Regex;

/// Route annotation parser for documentation comments.
///
/// Recognizes the Swagger-style forms, tried in order on each comment line:
///
/// - `@Router /path [method]`
/// - `@Router "/path" [method]`
/// - `@Router /path method`
///
/// The keyword matches in any case in every form.
///
/// The compiled patterns are built once per parser and only read afterwards.
#[derive(Debug, Clone)]
pub struct RouteAnnotationParser {
    patterns: Vec<Regex>,
}

impl RouteAnnotationParser {
    /// Builds the pattern table for the given annotation keyword (e.g. `@Router`).
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let kw = regex::escape(keyword);
        let sources = [
            format!(r#"(?i){kw}\s+([^\s\[\]]+)\s+\[([^\]]+)\]"#),
            format!(r#"(?i){kw}\s+"([^"]+)"\s+\[([^\]]+)\]"#),
            format!(r#"(?i){kw}\s+([^\s]+)\s+([A-Za-z]+)(?:\s|$)"#),
        ];
        let patterns = sources
            .iter()
            .map(|src| Regex::new(src))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns the first valid `(path, method)` found in the comment lines.
    ///
    /// Within one line the first matching form wins; a form whose method token is not an
    /// allowed HTTP method is skipped in favour of the next form.
    pub fn parse_lines<'a, I>(&self, lines: I) -> Option<(String, HttpMethod)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines.into_iter().find_map(|line| self.parse_line(line))
    }

    /// Parses a single comment line
    pub fn parse_line(&self, line: &str) -> Option<(String, HttpMethod)> {
        let text = normalize_comment_line(line);

        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(text) {
                let path = caps.get(1)?.as_str().trim_matches(|c| c == '"' || c == '\'');
                let Some(method) = caps.get(2).and_then(|m| HttpMethod::parse(m.as_str())) else {
                    continue;
                };
                return Some((path.to_string(), method));
            }
        }

        None
    }
}

/// Strips comment markers from one line of a doc comment.
fn normalize_comment_line(line: &str) -> &str {
    let text = line.trim();
    let text = text.strip_prefix("//").unwrap_or(text).trim();
    text.strip_prefix('*').unwrap_or(text).trim()
}

/// Splits the raw text of comment nodes into individual lines.
///
/// Line comments produce one line each. Block comments have their delimiters removed
/// and are split on newlines.
pub fn comment_lines(raw_comments: &[&str]) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in raw_comments {
        if let Some(body) = raw.strip_prefix("/*") {
            let body = body.strip_suffix("*/").unwrap_or(body);
            lines.extend(body.lines().map(|l| l.trim().to_string()));
        } else {
            lines.push(raw.trim().to_string());
        }
    }
    lines
}
