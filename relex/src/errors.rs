use std::{
    error::Error,
    fmt::Display,
    path::{Path, PathBuf},
};

use owo_colors::OwoColorize;
use relex_lexer::CompileError;

#[derive(Debug)]
pub enum Severity {
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", "error".bright_red().bold()),
        }
    }
}

#[derive(Debug)]
pub struct RelexError {
    severity: Severity,
    error: RelexErrorType,
}

#[derive(Debug)]
enum RelexErrorType {
    Io {
        file: PathBuf,
        error: std::io::Error,
    },
    Parse {
        file: PathBuf,
        line: u32,
        message: String,
    },
    Compile {
        file: PathBuf,
        line: u32,
        error: CompileError,
    },
    PromotedWarning {
        file: PathBuf,
        line: u32,
        message: String,
    },
}

impl RelexError {
    pub fn io(file: PathBuf, error: std::io::Error) -> Vec<RelexError> {
        vec![RelexError {
            severity: Severity::Error,
            error: RelexErrorType::Io { error, file },
        }]
    }

    pub fn parse(file: &Path, line: u32, message: String) -> RelexError {
        RelexError {
            severity: Severity::Error,
            error: RelexErrorType::Parse {
                file: file.to_path_buf(),
                line,
                message,
            },
        }
    }

    pub fn compile(file: &Path, errors: Vec<CompileError>) -> Vec<RelexError> {
        errors
            .into_iter()
            .map(|error| RelexError {
                severity: Severity::Error,
                error: RelexErrorType::Compile {
                    file: file.to_path_buf(),
                    line: error.line(),
                    error,
                },
            })
            .collect()
    }

    pub fn promoted_warning(file: &Path, line: u32, message: String) -> RelexError {
        RelexError {
            severity: Severity::Error,
            error: RelexErrorType::PromotedWarning {
                file: file.to_path_buf(),
                line,
                message,
            },
        }
    }
}

impl RelexErrorType {
    fn message(&self) -> &'static str {
        match self {
            RelexErrorType::Io { .. } => "cannot access file",
            RelexErrorType::Parse { .. } => "cannot parse specification",
            RelexErrorType::Compile { .. } => "cannot compile rules",
            RelexErrorType::PromotedWarning { .. } => "warning promoted to error",
        }
    }
}

impl Display for RelexErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelexErrorType::Io { error, file } => {
                write!(f, "     file: {}\n     reason: {}", file.display(), error)
            }
            RelexErrorType::Parse {
                file,
                line,
                message,
            }
            | RelexErrorType::PromotedWarning {
                file,
                line,
                message,
            } => write_section(file, *line, message, f),
            RelexErrorType::Compile { file, line, error } => {
                write_section(file, *line, &format!("{}", error), f)
            }
        }
    }
}

impl Error for RelexError {}

fn write_section(
    file: &Path,
    line: u32,
    contents: &str,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, " {} {}:{}", "-->".blue().bold(), file.display(), line)?;
    let lines: Vec<String> = std::iter::once("")
        .chain(contents.lines().chain(std::iter::once("")))
        .map(|l| format!("  {}  {}", "|".blue().bold(), l))
        .collect();
    write!(f, "{}", lines.join("\n"))
}

impl Display for RelexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.severity, self.error.message())?;
        write!(f, "{}", self.error)
    }
}
