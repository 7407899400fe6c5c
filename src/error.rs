//! Error types for ferro-sift
//!
//! This module provides the error taxonomy shared by the expression
//! language and the annotation engine:
//! - Error codes for categorization
//! - Source span tracking for expression parse errors
//! - Helpful diagnostic messages
//!
//! Missing values are never errors: a field absent from a record evaluates
//! to the empty sentinel and an allele without a database value is simply
//! not annotated.

use std::fmt;
use thiserror::Error;

/// Error codes for categorizing errors
///
/// These codes can be used for programmatic error handling
/// and for documentation lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // Parse errors (E1xxx)
    /// Unexpected characters in an expression
    UnexpectedChar = 1001,
    /// Unexpected end of expression
    UnexpectedEnd = 1002,
    /// Invalid index inside brackets
    InvalidIndex = 1003,
    /// Invalid regular expression literal
    InvalidRegex = 1004,
    /// Malformed VCF line
    InvalidVcfLine = 1101,
    /// Malformed database line
    InvalidDatabaseLine = 1201,

    // Configuration errors (E2xxx)
    /// Requested output field not present in the database
    UnknownDatabaseField = 2001,
    /// Database is not indexed
    MissingIndex = 2002,
    /// Invalid option or configuration file
    InvalidConfiguration = 2003,

    // Ordering errors (E3xxx)
    /// Input records are not position sorted
    UnsortedInput = 3001,

    // Evaluation errors (E4xxx)
    /// Unknown sub-field or scope mismatch
    InvalidFieldAccess = 4001,
    /// Set index outside of the loaded sets
    SetIndexOutOfBounds = 4002,

    // IO errors (E9xxx)
    /// File IO error
    IoError = 9001,
    /// JSON serialization error
    JsonError = 9002,
}

impl ErrorCode {
    /// Get the error code as a string (e.g., "E1001")
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a brief description of this error code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedChar => "unexpected character",
            ErrorCode::UnexpectedEnd => "unexpected end of expression",
            ErrorCode::InvalidIndex => "invalid field index",
            ErrorCode::InvalidRegex => "invalid regular expression",
            ErrorCode::InvalidVcfLine => "malformed VCF line",
            ErrorCode::InvalidDatabaseLine => "malformed database line",
            ErrorCode::UnknownDatabaseField => "field not present in database",
            ErrorCode::MissingIndex => "database index not found",
            ErrorCode::InvalidConfiguration => "invalid configuration",
            ErrorCode::UnsortedInput => "input is not position sorted",
            ErrorCode::InvalidFieldAccess => "invalid field access",
            ErrorCode::SetIndexOutOfBounds => "set index out of bounds",
            ErrorCode::IoError => "file I/O error",
            ErrorCode::JsonError => "JSON serialization error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A span in the source input indicating error location
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSpan {
    /// Starting byte offset (0-indexed)
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
}

impl SourceSpan {
    /// Create a new source span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span for a single position
    pub fn point(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos + 1,
        }
    }

    /// Format the source with the error highlighted
    ///
    /// Returns a string like:
    /// ```text
    /// QUAL > 30 && DP <
    ///                  ^
    /// ```
    pub fn highlight(&self, source: &str) -> String {
        if source.is_empty() {
            return String::new();
        }

        let safe_start = self.start.min(source.len());
        let safe_end = self.end.min(source.len()).max(safe_start);

        let mut pointer = String::with_capacity(source.len() + 4);
        for _ in 0..safe_start {
            pointer.push(' ');
        }
        pointer.push('^');
        for _ in (safe_start + 1)..safe_end {
            pointer.push('~');
        }

        format!("{}\n{}", source, pointer)
    }
}

/// Diagnostic information for an error
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    /// Error code
    pub code: Option<ErrorCode>,
    /// Source span for highlighting
    pub span: Option<SourceSpan>,
    /// The original input (for error display)
    pub source: Option<String>,
    /// Helpful hint or suggestion
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new empty diagnostic
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error code
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Add a source span
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Add the original source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Add a hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Format the diagnostic as a detailed error message
    pub fn format(&self, primary_message: &str) -> String {
        let mut result = String::new();

        if let Some(code) = &self.code {
            result.push_str(&format!("[{}] ", code));
        }

        result.push_str(primary_message);

        if let (Some(span), Some(source)) = (&self.span, &self.source) {
            result.push_str("\n\n");
            result.push_str(&span.highlight(source));
        }

        if let Some(hint) = &self.hint {
            result.push_str("\n\nHint: ");
            result.push_str(hint);
        }

        result
    }
}

/// Main error type for ferro-sift operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SiftError {
    /// Expression parse error with position and message
    #[error("Parse error at position {pos}: {msg}")]
    Parse {
        pos: usize,
        msg: String,
        /// Optional diagnostic with additional context
        diagnostic: Option<Box<Diagnostic>>,
    },

    /// Invalid configuration, detected before any record is processed
    #[error("Configuration error: {msg}")]
    Configuration { code: ErrorCode, msg: String },

    /// Primary stream is not sorted by position within a chromosome
    #[error("Input VCF must be sorted: previous entry {previous}, current entry {current}")]
    UnsortedInput { previous: String, current: String },

    /// Malformed query: unknown sub-field, scope mismatch, set index out of bounds
    #[error("Evaluation error: {msg}")]
    Evaluation { code: ErrorCode, msg: String },

    /// Malformed VCF input
    #[error("Invalid VCF record {record}: {msg}")]
    InvalidVcf { record: usize, msg: String },

    /// Malformed database content or index
    #[error("Invalid database: {msg}")]
    InvalidDatabase { msg: String },

    /// IO error (for file operations)
    #[error("IO error: {msg}")]
    Io { msg: String },

    /// JSON serialization error
    #[error("JSON error: {msg}")]
    Json { msg: String },
}

impl SiftError {
    /// Create a parse error with diagnostic information
    pub fn parse_with_diagnostic(
        pos: usize,
        msg: impl Into<String>,
        diagnostic: Diagnostic,
    ) -> Self {
        SiftError::Parse {
            pos,
            msg: msg.into(),
            diagnostic: Some(Box::new(diagnostic)),
        }
    }

    /// Create a simple parse error without diagnostic
    pub fn parse(pos: usize, msg: impl Into<String>) -> Self {
        SiftError::Parse {
            pos,
            msg: msg.into(),
            diagnostic: None,
        }
    }

    /// Create an evaluation error
    pub fn evaluation(msg: impl Into<String>) -> Self {
        SiftError::Evaluation {
            code: ErrorCode::InvalidFieldAccess,
            msg: msg.into(),
        }
    }

    /// Create an error for a set index outside the loaded sets
    pub fn set_index_out_of_bounds(index: i64, len: usize) -> Self {
        SiftError::Evaluation {
            code: ErrorCode::SetIndexOutOfBounds,
            msg: format!("Set index {} out of bounds, {} set(s) loaded", index, len),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        SiftError::Configuration {
            code: ErrorCode::InvalidConfiguration,
            msg: msg.into(),
        }
    }

    /// Create an error for a requested field the database does not have
    pub fn unknown_field(field: &str) -> Self {
        SiftError::Configuration {
            code: ErrorCode::UnknownDatabaseField,
            msg: format!("Field '{}' not found in database", field),
        }
    }

    /// Create an error for a database without its index
    pub fn missing_index(path: &str) -> Self {
        SiftError::Configuration {
            code: ErrorCode::MissingIndex,
            msg: format!("Database '{}' is not indexed (missing '{}.tbi')", path, path),
        }
    }

    /// Get the error code if available
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SiftError::Parse {
                diagnostic: Some(d),
                ..
            } => d.code,
            SiftError::Parse { .. } => None,
            SiftError::Configuration { code, .. } => Some(*code),
            SiftError::UnsortedInput { .. } => Some(ErrorCode::UnsortedInput),
            SiftError::Evaluation { code, .. } => Some(*code),
            SiftError::InvalidVcf { .. } => Some(ErrorCode::InvalidVcfLine),
            SiftError::InvalidDatabase { .. } => Some(ErrorCode::InvalidDatabaseLine),
            SiftError::Io { .. } => Some(ErrorCode::IoError),
            SiftError::Json { .. } => Some(ErrorCode::JsonError),
        }
    }

    /// Whether the run can continue after this error
    ///
    /// Every variant terminates the run; recoverable conditions (missing
    /// values) never surface as errors.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Get a formatted error with full diagnostic output
    pub fn detailed_message(&self) -> String {
        match self {
            SiftError::Parse {
                pos,
                msg,
                diagnostic: Some(d),
            } => d.format(&format!("Parse error at position {}: {}", pos, msg)),
            _ => self.to_string(),
        }
    }
}

impl From<std::io::Error> for SiftError {
    fn from(err: std::io::Error) -> Self {
        SiftError::Io {
            msg: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SiftError {
    fn from(err: serde_json::Error) -> Self {
        SiftError::Json {
            msg: err.to_string(),
        }
    }
}
