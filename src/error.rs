//! Error types for parsing, semantic checking and well-formedness analysis.
//!
//! Mirrors the manual `Display`/`Error` style used throughout this crate's
//! CLI option parsing rather than pulling in an error-derive crate: each
//! error is a small struct or enum with a direct `fmt::Display` impl.

use std::fmt;

/// A location-tagged parse error, fatal for the run that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            col,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Semantic errors discovered after a game declaration parses successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    UndefinedVariable(String),
    UndefinedMapping(String),
    ParamIndexOutOfRange { param_pos: usize, arity: usize },
    MalformedParamsDistinct { index: usize, arity: usize },
    MalformedParamsSorted { left: usize, right: usize, arity: usize },
    AlphabetRedefined,
    DuplicateVariable(String),
    DuplicateMapping(String),
    DuplicateExperiment(String),
    MappingLengthMismatch { name: String, expected: usize, found: usize },
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable(name) => write!(f, "undefined variable '{name}'"),
            Self::UndefinedMapping(name) => write!(f, "undefined mapping '{name}'"),
            Self::ParamIndexOutOfRange { param_pos, arity } => write!(
                f,
                "parameter position {param_pos} out of range for arity {arity}"
            ),
            Self::MalformedParamsDistinct { index, arity } => write!(
                f,
                "PARAMS_DISTINCT references position {index} out of range for arity {arity}"
            ),
            Self::MalformedParamsSorted { left, right, arity } => write!(
                f,
                "PARAMS_SORTED pair ({left}, {right}) out of range or not increasing for arity {arity}"
            ),
            Self::AlphabetRedefined => write!(f, "alphabet declared more than once"),
            Self::DuplicateVariable(name) => write!(f, "variable '{name}' declared more than once"),
            Self::DuplicateMapping(name) => write!(f, "mapping '{name}' declared more than once"),
            Self::DuplicateExperiment(name) => {
                write!(f, "experiment type '{name}' declared more than once")
            }
            Self::MappingLengthMismatch { name, expected, found } => write!(
                f,
                "mapping '{name}' has {found} entries, expected {expected} (alphabet size)"
            ),
        }
    }
}

impl std::error::Error for SemanticError {}

/// A counter-example witnessing a failed well-formedness check (spec §6).
#[derive(Debug, Clone)]
pub struct WellFormedViolation {
    pub experiment: String,
    pub params: Vec<String>,
    pub assignment: Vec<bool>,
}

impl fmt::Display for WellFormedViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "experiment '{}' with params ({}) is not well-formed: found a code satisfying zero or more than one outcome",
            self.experiment,
            self.params.join(", "),
        )
    }
}

impl std::error::Error for WellFormedViolation {}

/// Top-level error union returned by game loading and analysis.
#[derive(Debug)]
pub enum GameError {
    Parse(ParseError),
    Semantic(SemanticError),
    WellFormed(WellFormedViolation),
    Io(std::io::Error),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Semantic(e) => write!(f, "semantic error: {e}"),
            Self::WellFormed(e) => write!(f, "well-formedness violation: {e}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Semantic(e) => Some(e),
            Self::WellFormed(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ParseError> for GameError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<SemanticError> for GameError {
    fn from(e: SemanticError) -> Self {
        Self::Semantic(e)
    }
}

impl From<WellFormedViolation> for GameError {
    fn from(e: WellFormedViolation) -> Self {
        Self::WellFormed(e)
    }
}

impl From<std::io::Error> for GameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
