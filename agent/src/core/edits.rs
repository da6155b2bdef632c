//! Pure line-level text transforms behind the repair tools.
//!
//! Every function takes the current file contents and returns the new
//! contents, so the tools only read and write files around these calls.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::action::{SyntaxFix, YamlFix};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("line {line} is out of range (file has {len} lines)")]
    LineOutOfRange { line: usize, len: usize },
    #[error("line {0} is not a bare print statement")]
    NotPrint(usize),
    #[error("line {0} has no '==' assertion")]
    NoAssertion(usize),
}

/// File contents split into lines, remembering the line ending and whether
/// the last line ended with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub lines: Vec<String>,
    pub newline: &'static str,
    pub trailing_newline: bool,
}

impl SourceFile {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            newline: line_ending(text),
            trailing_newline: text.ends_with('\n'),
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join(self.newline);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(self.newline);
        }
        out
    }

    /// 0-based index for a 1-based line number.
    fn index(&self, line: usize) -> Result<usize, EditError> {
        if line == 0 || line > self.lines.len() {
            return Err(EditError::LineOutOfRange {
                line,
                len: self.lines.len(),
            });
        }
        Ok(line - 1)
    }
}

/// Apply a `fix_syntax_error` repair to `line` (1-based).
pub fn fix_syntax(text: &str, line: usize, kind: SyntaxFix) -> Result<String, EditError> {
    let mut file = SourceFile::parse(text);
    let idx = file.index(line)?;
    match kind {
        SyntaxFix::AddColon => {
            file.lines[idx] = add_colon(&file.lines[idx]);
        }
        SyntaxFix::AddParenthesis => {
            file.lines[idx] = add_parenthesis(&file.lines[idx]).ok_or(EditError::NotPrint(line))?;
        }
        SyntaxFix::FixIndentation => {
            file.lines[idx] = format!("    {}", file.lines[idx].trim_start());
        }
        SyntaxFix::AddBlankLines | SyntaxFix::RemoveBlankLines => {
            normalize_blank_lines(&mut file.lines, idx);
        }
    }
    Ok(file.render())
}

/// Apply a `fix_yaml_syntax` repair to `line` (1-based).
pub fn fix_yaml(text: &str, line: usize, kind: YamlFix) -> Result<String, EditError> {
    let mut file = SourceFile::parse(text);
    let idx = file.index(line)?;
    match kind {
        YamlFix::AddColon => file.lines[idx] = yaml_add_colon(&file.lines[idx]),
    }
    Ok(file.render())
}

/// Replace everything after the first `==` on `line` with `expected`.
pub fn fix_assertion(text: &str, line: usize, expected: &str) -> Result<String, EditError> {
    let mut file = SourceFile::parse(text);
    let idx = file.index(line)?;
    let current = &file.lines[idx];
    let pos = current.find("==").ok_or(EditError::NoAssertion(line))?;
    let fixed = format!("{} {}", &current[..pos + 2], expected.trim());
    file.lines[idx] = fixed;
    Ok(file.render())
}

/// `\r\n` when the first line break of `text` is CRLF, else `\n`.
fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(pos) if text[..pos].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

/// Prepend `statement` unless some line already equals it.
pub fn prepend_import(text: &str, statement: &str) -> String {
    let statement = statement.trim();
    if text.lines().any(|l| l.trim() == statement) {
        return text.to_string();
    }
    format!("{statement}{}{text}", line_ending(text))
}

/// Drop every line that contains `statement`. Returns the new text and the
/// number of removed lines.
pub fn remove_import(text: &str, statement: &str) -> (String, usize) {
    let statement = statement.trim();
    let mut file = SourceFile::parse(text);
    let before = file.lines.len();
    file.lines.retain(|l| !l.contains(statement));
    let removed = before - file.lines.len();
    (file.render(), removed)
}

/// Append `package` to a requirements file unless an entry with the same
/// distribution name already exists. Returns `None` when nothing changed.
pub fn append_requirement(text: &str, package: &str) -> Option<String> {
    let package = package.trim();
    let wanted = requirement_name(package);
    if text.lines().any(|l| requirement_name(l) == wanted) {
        return None;
    }
    let newline = line_ending(text);
    let mut out = text.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push_str(newline);
    }
    out.push_str(package);
    out.push_str(newline);
    Some(out)
}

fn requirement_name(line: &str) -> String {
    let line = line.trim();
    let end = line
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(line.len());
    line[..end].to_ascii_lowercase().replace('_', "-")
}

/// Split a line into code and trailing `#` comment, ignoring `#` inside
/// string literals.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return (&line[..i], Some(&line[i..])),
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            _ => {}
        }
    }
    (line, None)
}

fn add_colon(line: &str) -> String {
    let (code, comment) = split_comment(line);
    let code = code.trim_end();
    if code.ends_with(':') {
        return line.to_string();
    }
    match comment {
        Some(comment) => format!("{code}:  {comment}"),
        None => format!("{code}:"),
    }
}

fn add_parenthesis(line: &str) -> Option<String> {
    let (code, comment) = split_comment(line);
    let indent_len = code.len() - code.trim_start().len();
    let (indent, body) = code.split_at(indent_len);
    let arg = body.trim_end().strip_prefix("print ")?.trim();
    if arg.starts_with('(') && arg.ends_with(')') {
        return None;
    }
    Some(match comment {
        Some(comment) => format!("{indent}print({arg})  {comment}"),
        None => format!("{indent}print({arg})"),
    })
}

/// Replace the run of blank lines directly above `idx` with exactly two.
fn normalize_blank_lines(lines: &mut Vec<String>, idx: usize) {
    let mut start = idx;
    while start > 0 && lines[start - 1].trim().is_empty() {
        start -= 1;
    }
    lines.splice(start..idx, [String::new(), String::new()]);
}

static YAML_KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*(?:-\s+)?)([A-Za-z_][\w-]*)\s+(\S.*)$").expect("yaml key regex")
});

fn yaml_add_colon(line: &str) -> String {
    let (code, comment) = split_comment(line);
    if code.contains(':') {
        return line.to_string();
    }
    let code = code.trim_end();
    let fixed = match YAML_KEY_VALUE.captures(code) {
        Some(caps) => format!("{}{}: {}", &caps[1], &caps[2], &caps[3]),
        None => format!("{code}:"),
    };
    match comment {
        Some(comment) => format!("{fixed}  {comment}"),
        None => fixed,
    }
}
