use thiserror::Error;

/// Errors that can occur while parsing rule files or condition expressions.
#[derive(Debug, Error)]
pub enum RuleParserError {
    #[error("Condition parse error: {0}")]
    Condition(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Missing required field '{0}'")]
    MissingField(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid size literal: {0}")]
    InvalidSize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleParserError>;
