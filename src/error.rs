//! Error types for zenfig operations

use colored::Colorize;
use std::fmt;
use std::io;
use thiserror::Error;

use zenfig_core::ParseError;

/// Error family. Each family maps onto one variant of [`ZenfigError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Provider,
    Cli,
    System,
    Render,
}

impl ErrorKind {
    /// Label used as the first word of a formatted error.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Provider => "ProviderError",
            ErrorKind::Cli => "CliError",
            ErrorKind::System => "SystemError",
            ErrorKind::Render => "RenderError",
        }
    }
}

/// Closed set of error codes. The code alone decides the family and the
/// process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// VAL001: value does not have the expected type or cannot be parsed
    TypeMismatch,
    /// VAL002: range, length, pattern, format, enum or literal violation
    ConstraintViolation,
    /// VAL003: required value is missing
    MissingRequired,
    /// VAL004: key or path is not part of the schema
    UnknownKey,
    /// VAL005: two services disagree on a value under strict merging
    MergeConflict,
    /// PROV001: store unavailable, throttled, timed out, or unclassified
    ProviderUnavailable,
    /// PROV002: credentials, identity, or read access problem
    ProviderAuth,
    /// PROV003: parameter does not exist
    ParameterNotFound,
    /// PROV004: provider is not registered or its URI is invalid
    ProviderNotFound,
    /// PROV005: write access denied
    WriteDenied,
    /// PROV006: live account/region does not match the declared guards
    GuardMismatch,
    /// CLI001: invalid argument
    InvalidArgument,
    /// CLI002: required argument or setting is missing
    MissingArgument,
    /// CLI003: a mutating command needs explicit confirmation
    ConfirmationRequired,
    /// SYS001: filesystem read/write failure
    FileSystem,
    /// SYS002: a file exists but its contents are not understood
    InvalidFormat,
    /// SYS003: snapshot was captured against a different schema
    SnapshotSchemaMismatch,
    /// RND001: renderer binary is not installed
    RendererNotFound,
    /// RND002: renderer exceeded its timeout
    RenderTimeout,
    /// RND003: template does not parse
    TemplateSyntax,
    /// RND004: template failed while evaluating
    TemplateRuntime,
    /// RND005: template references an external variable that was not passed
    MissingExternalVariable,
    /// RND006: renderer output is not a JSON object
    RenderOutput,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeMismatch => "VAL001",
            ErrorCode::ConstraintViolation => "VAL002",
            ErrorCode::MissingRequired => "VAL003",
            ErrorCode::UnknownKey => "VAL004",
            ErrorCode::MergeConflict => "VAL005",
            ErrorCode::ProviderUnavailable => "PROV001",
            ErrorCode::ProviderAuth => "PROV002",
            ErrorCode::ParameterNotFound => "PROV003",
            ErrorCode::ProviderNotFound => "PROV004",
            ErrorCode::WriteDenied => "PROV005",
            ErrorCode::GuardMismatch => "PROV006",
            ErrorCode::InvalidArgument => "CLI001",
            ErrorCode::MissingArgument => "CLI002",
            ErrorCode::ConfirmationRequired => "CLI003",
            ErrorCode::FileSystem => "SYS001",
            ErrorCode::InvalidFormat => "SYS002",
            ErrorCode::SnapshotSchemaMismatch => "SYS003",
            ErrorCode::RendererNotFound => "RND001",
            ErrorCode::RenderTimeout => "RND002",
            ErrorCode::TemplateSyntax => "RND003",
            ErrorCode::TemplateRuntime => "RND004",
            ErrorCode::MissingExternalVariable => "RND005",
            ErrorCode::RenderOutput => "RND006",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::TypeMismatch
            | ErrorCode::ConstraintViolation
            | ErrorCode::MissingRequired
            | ErrorCode::UnknownKey
            | ErrorCode::MergeConflict => ErrorKind::Validation,
            ErrorCode::ProviderUnavailable
            | ErrorCode::ProviderAuth
            | ErrorCode::ParameterNotFound
            | ErrorCode::ProviderNotFound
            | ErrorCode::WriteDenied
            | ErrorCode::GuardMismatch => ErrorKind::Provider,
            ErrorCode::InvalidArgument
            | ErrorCode::MissingArgument
            | ErrorCode::ConfirmationRequired => ErrorKind::Cli,
            ErrorCode::FileSystem
            | ErrorCode::InvalidFormat
            | ErrorCode::SnapshotSchemaMismatch => ErrorKind::System,
            ErrorCode::RendererNotFound
            | ErrorCode::RenderTimeout
            | ErrorCode::TemplateSyntax
            | ErrorCode::TemplateRuntime
            | ErrorCode::MissingExternalVariable
            | ErrorCode::RenderOutput => ErrorKind::Render,
        }
    }

    /// Process exit code for this error.
    ///
    /// 1 validation, 2 config/CLI (including template rendering), 3 filesystem,
    /// 4 auth/provider, 5 snapshot schema mismatch.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::SnapshotSchemaMismatch => 5,
            _ => match self.kind() {
                ErrorKind::Validation => 1,
                ErrorKind::Cli | ErrorKind::Render => 2,
                ErrorKind::System => 3,
                ErrorKind::Provider => 4,
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an error knows about what went wrong and how to fix it.
#[derive(Debug)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub path: Option<String>,
    pub expected: Option<String>,
    pub received: Option<String>,
    pub problem: Option<String>,
    pub remediation: Option<String>,
    pub example: Option<String>,
    pub available_keys: Vec<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The main error type for zenfig operations.
///
/// One tagged variant per error family; the family is derived from the code,
/// so constructing through [`ZenfigError::new`] always lands in the right
/// variant.
#[derive(Error, Debug)]
pub enum ZenfigError {
    #[error("{0}")]
    Validation(Box<Diagnostic>),
    #[error("{0}")]
    Provider(Box<Diagnostic>),
    #[error("{0}")]
    Cli(Box<Diagnostic>),
    #[error("{0}")]
    System(Box<Diagnostic>),
    #[error("{0}")]
    Render(Box<Diagnostic>),
}

/// A type alias for `Result<T, ZenfigError>`
pub type Result<T> = std::result::Result<T, ZenfigError>;

impl ZenfigError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let diagnostic = Box::new(Diagnostic {
            code,
            message: message.into(),
            path: None,
            expected: None,
            received: None,
            problem: None,
            remediation: None,
            example: None,
            available_keys: Vec::new(),
            source: None,
        });
        match code.kind() {
            ErrorKind::Validation => ZenfigError::Validation(diagnostic),
            ErrorKind::Provider => ZenfigError::Provider(diagnostic),
            ErrorKind::Cli => ZenfigError::Cli(diagnostic),
            ErrorKind::System => ZenfigError::System(diagnostic),
            ErrorKind::Render => ZenfigError::Render(diagnostic),
        }
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            ZenfigError::Validation(d)
            | ZenfigError::Provider(d)
            | ZenfigError::Cli(d)
            | ZenfigError::System(d)
            | ZenfigError::Render(d) => d,
        }
    }

    fn diagnostic_mut(&mut self) -> &mut Diagnostic {
        match self {
            ZenfigError::Validation(d)
            | ZenfigError::Provider(d)
            | ZenfigError::Cli(d)
            | ZenfigError::System(d)
            | ZenfigError::Render(d) => d,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.diagnostic().code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    pub fn path(&self) -> Option<&str> {
        self.diagnostic().path.as_deref()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.diagnostic_mut().path = Some(path.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.diagnostic_mut().expected = Some(expected.into());
        self
    }

    pub fn with_received(mut self, received: impl Into<String>) -> Self {
        self.diagnostic_mut().received = Some(received.into());
        self
    }

    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.diagnostic_mut().problem = Some(problem.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.diagnostic_mut().remediation = Some(remediation.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.diagnostic_mut().example = Some(example.into());
        self
    }

    pub fn with_available_keys(mut self, keys: Vec<String>) -> Self {
        self.diagnostic_mut().available_keys = keys;
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.diagnostic_mut().source = Some(Box::new(source));
        self
    }

    /// Shorthand for a validation error located at `path`.
    pub fn validation(code: ErrorCode, path: &str, message: impl Into<String>) -> Self {
        Self::new(code, message).with_path(path)
    }
}

impl From<io::Error> for ZenfigError {
    fn from(err: io::Error) -> Self {
        ZenfigError::new(ErrorCode::FileSystem, format!("IO error: {}", err)).with_source(err)
    }
}

impl From<serde_json::Error> for ZenfigError {
    fn from(err: serde_json::Error) -> Self {
        ZenfigError::new(ErrorCode::InvalidFormat, format!("JSON error: {}", err)).with_source(err)
    }
}

impl From<toml::de::Error> for ZenfigError {
    fn from(err: toml::de::Error) -> Self {
        ZenfigError::new(ErrorCode::InvalidFormat, format!("TOML parsing error: {}", err))
            .with_source(err)
    }
}

impl From<toml::ser::Error> for ZenfigError {
    fn from(err: toml::ser::Error) -> Self {
        ZenfigError::new(
            ErrorCode::InvalidFormat,
            format!("TOML serialization error: {}", err),
        )
        .with_source(err)
    }
}

impl From<inquire::InquireError> for ZenfigError {
    fn from(err: inquire::InquireError) -> Self {
        ZenfigError::new(
            ErrorCode::InvalidArgument,
            format!("User interaction error: {}", err),
        )
        .with_source(err)
    }
}

impl From<ParseError> for ZenfigError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(io_err) => {
                if io_err.kind() == io::ErrorKind::NotFound {
                    ZenfigError::new(
                        ErrorCode::FileSystem,
                        "No zenfig.toml found in current directory",
                    )
                    .with_remediation("Create a zenfig.toml or pass --config <path>")
                    .with_source(io_err)
                } else {
                    io_err.into()
                }
            }
            ParseError::Toml(toml_err) => toml_err.into(),
            other => ZenfigError::new(ErrorCode::InvalidFormat, other.to_string()),
        }
    }
}

/// Render an error in the structured multi-line form printed by the CLI:
///
/// ```text
/// ValidationError [VAL001]: database.port
///   Cannot parse "not-a-number" as integer
///   Expected: integer
///   Received: "not-a-number"
/// ```
pub fn format_error(err: &ZenfigError, color: bool) -> String {
    let d = err.diagnostic();
    let mut header = format!("{} [{}]", err.kind().label(), d.code);
    if let Some(path) = &d.path {
        header.push_str(": ");
        header.push_str(path);
    }

    let mut out = if color {
        header.red().bold().to_string()
    } else {
        header
    };
    out.push('\n');
    out.push_str(&format!("  {}\n", d.message));

    let fields = [
        ("Expected", &d.expected),
        ("Received", &d.received),
        ("Problem", &d.problem),
        ("Fix", &d.remediation),
        ("Example", &d.example),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let label = if color {
                label.bold().to_string()
            } else {
                label.to_string()
            };
            out.push_str(&format!("  {}: {}\n", label, value));
        }
    }

    if !d.available_keys.is_empty() {
        out.push_str(&format!(
            "  Available keys: {}\n",
            d.available_keys.join(", ")
        ));
    }

    if let Some(source) = &d.source {
        let source = source.to_string();
        if !d.message.contains(&source) {
            out.push_str(&format!("  Caused by: {}\n", source));
        }
    }

    out
}
