//! Closed set of repair and inspection tools and their typed parameters.
//!
//! The model addresses tools by wire name with a colon-delimited parameter
//! string. That string is parsed exactly once into an [`Action`]; everything
//! downstream works with typed values.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Wire names of every registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    RunCiPipeline,
    AnalyzeFile,
    FixSyntaxError,
    AddImport,
    RemoveUnusedImport,
    FixTestAssertion,
    AddDependency,
    FixYamlSyntax,
    RunTests,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::RunCiPipeline,
        ToolName::AnalyzeFile,
        ToolName::FixSyntaxError,
        ToolName::AddImport,
        ToolName::RemoveUnusedImport,
        ToolName::FixTestAssertion,
        ToolName::AddDependency,
        ToolName::FixYamlSyntax,
        ToolName::RunTests,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::RunCiPipeline => "run_ci_pipeline",
            ToolName::AnalyzeFile => "analyze_file",
            ToolName::FixSyntaxError => "fix_syntax_error",
            ToolName::AddImport => "add_import",
            ToolName::RemoveUnusedImport => "remove_unused_import",
            ToolName::FixTestAssertion => "fix_test_assertion",
            ToolName::AddDependency => "add_dependency",
            ToolName::FixYamlSyntax => "fix_yaml_syntax",
            ToolName::RunTests => "run_tests",
        }
    }

    /// Parameter shape shown to the model.
    pub fn usage(self) -> &'static str {
        match self {
            ToolName::RunCiPipeline | ToolName::RunTests => "",
            ToolName::AnalyzeFile => "path",
            ToolName::FixSyntaxError => "path:line:kind",
            ToolName::AddImport | ToolName::RemoveUnusedImport => "path:import_statement",
            ToolName::FixTestAssertion => "path:line:expected_value",
            ToolName::AddDependency => "package",
            ToolName::FixYamlSyntax => "path:line:add_colon",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::RunCiPipeline => {
                "Run the full CI pipeline (syntax, lint, tests, dependencies, config, security) \
                 and report the first failing check."
            }
            ToolName::AnalyzeFile => "Show the file contents with line numbers.",
            ToolName::FixSyntaxError => {
                "Repair one line. kind is one of add_colon, add_parenthesis, fix_indentation, \
                 add_blank_lines, remove_blank_lines."
            }
            ToolName::AddImport => {
                "Prepend an import statement to a file unless it is already present."
            }
            ToolName::RemoveUnusedImport => "Delete lines containing the given import statement.",
            ToolName::FixTestAssertion => {
                "Replace the expected value on the right-hand side of the first == on the line."
            }
            ToolName::AddDependency => {
                "Append a package to requirements.txt unless it is already listed."
            }
            ToolName::FixYamlSyntax => {
                "Insert the missing colon after a YAML key on the given line."
            }
            ToolName::RunTests => "Run only the test suite and return its output.",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tool '{0}'")]
pub struct UnknownTool(pub String);

impl FromStr for ToolName {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownTool(s.to_string()))
    }
}

/// Line-level repair applied by `fix_syntax_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxFix {
    AddColon,
    AddParenthesis,
    FixIndentation,
    AddBlankLines,
    RemoveBlankLines,
}

impl FromStr for SyntaxFix {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_colon" => Ok(SyntaxFix::AddColon),
            "add_parenthesis" => Ok(SyntaxFix::AddParenthesis),
            "fix_indentation" => Ok(SyntaxFix::FixIndentation),
            "add_blank_lines" => Ok(SyntaxFix::AddBlankLines),
            "remove_blank_lines" => Ok(SyntaxFix::RemoveBlankLines),
            other => Err(ParamError::UnknownKind(other.to_string())),
        }
    }
}

/// Repair applied by `fix_yaml_syntax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YamlFix {
    AddColon,
}

impl FromStr for YamlFix {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add_colon" => Ok(YamlFix::AddColon),
            other => Err(ParamError::UnknownKind(other.to_string())),
        }
    }
}

/// Workspace-relative file plus a 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTarget {
    pub path: String,
    pub line: usize,
}

/// Problems with a tool's parameter string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("expected parameters '{expected}', got '{got}'")]
    Shape { expected: &'static str, got: String },
    #[error("invalid line number '{0}'")]
    Line(String),
    #[error("unknown fix kind '{0}'")]
    UnknownKind(String),
    #[error("missing {0}")]
    Missing(&'static str),
}

/// A fully parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RunCiPipeline,
    AnalyzeFile { path: String },
    FixSyntaxError { target: LineTarget, kind: SyntaxFix },
    AddImport { path: String, statement: String },
    RemoveUnusedImport { path: String, statement: String },
    FixTestAssertion {
        target: LineTarget,
        expected: String,
    },
    AddDependency { package: String },
    FixYamlSyntax { target: LineTarget, kind: YamlFix },
    RunTests,
}

impl Action {
    /// Parse the colon-delimited parameter string for `tool`.
    pub fn parse(tool: ToolName, input: &str) -> Result<Self, ParamError> {
        let input = input.trim();
        match tool {
            ToolName::RunCiPipeline => Ok(Action::RunCiPipeline),
            ToolName::RunTests => Ok(Action::RunTests),
            ToolName::AnalyzeFile => Ok(Action::AnalyzeFile {
                path: non_empty(input, "path")?.to_string(),
            }),
            ToolName::FixSyntaxError => {
                let (target, kind) = parse_target_and_rest(tool, input)?;
                Ok(Action::FixSyntaxError {
                    target,
                    kind: kind.trim().parse()?,
                })
            }
            ToolName::AddImport | ToolName::RemoveUnusedImport => {
                let (path, statement) = input.split_once(':').ok_or_else(|| shape(tool, input))?;
                let path = non_empty(path, "path")?.to_string();
                let statement = non_empty(statement, "import statement")?.to_string();
                Ok(if tool == ToolName::AddImport {
                    Action::AddImport { path, statement }
                } else {
                    Action::RemoveUnusedImport { path, statement }
                })
            }
            ToolName::FixTestAssertion => {
                let (target, rest) = parse_target_and_rest(tool, input)?;
                // Optional parameter name before the value: `path:line:name:value`.
                let expected = match rest.split_once(':') {
                    Some((_name, value)) => value,
                    None => rest,
                };
                Ok(Action::FixTestAssertion {
                    target,
                    expected: non_empty(expected, "expected value")?.to_string(),
                })
            }
            ToolName::AddDependency => Ok(Action::AddDependency {
                package: non_empty(input, "package")?.to_string(),
            }),
            ToolName::FixYamlSyntax => {
                let (target, kind) = parse_target_and_rest(tool, input)?;
                Ok(Action::FixYamlSyntax {
                    target,
                    kind: kind.trim().parse()?,
                })
            }
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            Action::RunCiPipeline => ToolName::RunCiPipeline,
            Action::AnalyzeFile { .. } => ToolName::AnalyzeFile,
            Action::FixSyntaxError { .. } => ToolName::FixSyntaxError,
            Action::AddImport { .. } => ToolName::AddImport,
            Action::RemoveUnusedImport { .. } => ToolName::RemoveUnusedImport,
            Action::FixTestAssertion { .. } => ToolName::FixTestAssertion,
            Action::AddDependency { .. } => ToolName::AddDependency,
            Action::FixYamlSyntax { .. } => ToolName::FixYamlSyntax,
            Action::RunTests => ToolName::RunTests,
        }
    }
}

fn shape(tool: ToolName, got: &str) -> ParamError {
    ParamError::Shape {
        expected: tool.usage(),
        got: got.to_string(),
    }
}

fn non_empty<'a>(value: &'a str, what: &'static str) -> Result<&'a str, ParamError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ParamError::Missing(what))
    } else {
        Ok(value)
    }
}

/// Split `path:line:rest`, validating the path and the line number.
fn parse_target_and_rest(tool: ToolName, input: &str) -> Result<(LineTarget, &str), ParamError> {
    let mut parts = input.splitn(3, ':');
    let (Some(path), Some(line), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(shape(tool, input));
    };
    let path = non_empty(path, "path")?.to_string();
    let line_text = line.trim();
    let line: usize = line_text
        .parse()
        .map_err(|_| ParamError::Line(line_text.to_string()))?;
    if line == 0 {
        return Err(ParamError::Line(line_text.to_string()));
    }
    Ok((LineTarget { path, line }, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip_through_wire_names() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>(), Ok(name));
        }
        assert_eq!(
            "delete_everything".parse::<ToolName>(),
            Err(UnknownTool("delete_everything".to_string()))
        );
    }

    #[test]
    fn parses_fix_syntax_error() {
        let action =
            Action::parse(ToolName::FixSyntaxError, "calculator.py:3:add_colon").expect("parse");
        assert_eq!(
            action,
            Action::FixSyntaxError {
                target: LineTarget {
                    path: "calculator.py".to_string(),
                    line: 3
                },
                kind: SyntaxFix::AddColon,
            }
        );
    }

    #[test]
    fn rejects_bad_line_numbers() {
        assert_eq!(
            Action::parse(ToolName::FixSyntaxError, "calculator.py:abc:add_colon"),
            Err(ParamError::Line("abc".to_string()))
        );
        assert_eq!(
            Action::parse(ToolName::FixSyntaxError, "calculator.py:0:add_colon"),
            Err(ParamError::Line("0".to_string()))
        );
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(matches!(
            Action::parse(ToolName::FixSyntaxError, "calculator.py:3"),
            Err(ParamError::Shape { .. })
        ));
        assert!(matches!(
            Action::parse(ToolName::AddImport, "import math"),
            Err(ParamError::Shape { .. })
        ));
        assert_eq!(
            Action::parse(ToolName::AnalyzeFile, "  "),
            Err(ParamError::Missing("path"))
        );
    }

    #[test]
    fn rejects_unknown_fix_kind() {
        assert_eq!(
            Action::parse(ToolName::FixSyntaxError, "a.py:1:rewrite_everything"),
            Err(ParamError::UnknownKind("rewrite_everything".to_string()))
        );
    }

    #[test]
    fn test_assertion_accepts_optional_parameter_name() {
        let parse = |input| Action::parse(ToolName::FixTestAssertion, input).expect("parse");
        let short = parse("tests/test_calculator.py:9:5");
        let named = parse("tests/test_calculator.py:9:expected:5");
        assert_eq!(short, named);
        assert!(matches!(
            short,
            Action::FixTestAssertion { ref expected, .. } if expected == "5"
        ));
    }

    #[test]
    fn add_import_keeps_statement_verbatim() {
        let action = Action::parse(ToolName::AddImport, "calculator.py:from math import sqrt")
            .expect("parse");
        assert_eq!(
            action,
            Action::AddImport {
                path: "calculator.py".to_string(),
                statement: "from math import sqrt".to_string(),
            }
        );
    }

    #[test]
    fn parameterless_tools_ignore_input() {
        assert_eq!(
            Action::parse(ToolName::RunCiPipeline, "whatever"),
            Ok(Action::RunCiPipeline)
        );
        assert_eq!(Action::parse(ToolName::RunTests, ""), Ok(Action::RunTests));
    }
}
