use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::lexer::Pos;

/// Result type alias for operations that can fail with an interpreter error.
pub type RunResult<T> = Result<T, Error>;

/// The kinds of error the interpreter can raise.
///
/// Uses strum derives for automatic `Display` and `Into<&'static str>`
/// implementations; the string representation matches the variant name
/// (e.g. `UndefinedVariable` -> "UndefinedVariable").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ErrorKind {
    /// Malformed token, with source position.
    LexError,
    /// Grammar violation, with source position.
    ParseError,
    /// A type name was looked up but is not registered.
    UnknownType,
    /// A type was registered twice under the same name.
    TypeExists,
    /// A function was registered twice under the same signature id.
    DuplicateFunction,
    /// More than one registered function matches a call site.
    AmbiguousCall,
    /// No registered function matches a call site.
    NoMatchingFunction,
    /// A name was read before any scope bound it.
    UndefinedVariable,
    /// A field or index accessor does not apply to the accessed value.
    BadAccess,
    /// An array index is outside the live range.
    OutOfRange,
    /// A coercion between value tags that is not defined.
    BadCast,
    /// `return` executed with only the root frame live.
    BadReturn,
    /// A machine stack exceeded its configured bound.
    StackOverflow,
    /// A machine stack was popped or addressed below its live range.
    StackUnderflow,
    /// `@import` of a module whose import is already in progress.
    CyclicalImport,
    /// `@import` of a name that resolves to neither a library nor a file.
    ModuleNotFound,
    /// A subtype redeclared an inherited member without an initializer.
    RedefinedMember,
    /// The expand operator `...` was applied to a non-array value.
    InvalidExpansion,
    /// An error raised by a host-registered native function.
    HostError,
}

/// An interpreter error: a kind, a human-readable message, and a source
/// position where one applies (lex and parse errors always carry one).
///
/// Renders as `error: MESSAGE (LINE:COL)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    pos: Option<Pos>,
    incomplete: bool,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pos: None,
            incomplete: false,
        }
    }

    pub(crate) fn with_pos(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            message: message.into(),
            pos: Some(pos),
            incomplete: false,
        }
    }

    pub(crate) fn lex(message: impl Into<String>, pos: Pos) -> Self {
        Self::with_pos(ErrorKind::LexError, message, pos)
    }

    pub(crate) fn parse(message: impl Into<String>, pos: Pos) -> Self {
        Self::with_pos(ErrorKind::ParseError, message, pos)
    }

    /// A parse error caused by the source ending mid-statement.
    ///
    /// Distinguished from other parse errors so a REPL can keep buffering
    /// input instead of reporting a failure.
    pub(crate) fn incomplete(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind: ErrorKind::ParseError,
            message: message.into(),
            pos: Some(pos),
            incomplete: true,
        }
    }

    pub(crate) fn bad_cast(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadCast, message)
    }

    pub(crate) fn bad_access(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadAccess, message)
    }

    pub(crate) fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("undefined variable '{name}'"))
    }

    pub(crate) fn unknown_type(name: &str) -> Self {
        Self::new(ErrorKind::UnknownType, format!("unrecognized type '{name}'"))
    }

    /// Creates an error raised by host code (a native function).
    #[must_use]
    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HostError, message)
    }

    /// The error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message, without the `error:` prefix or position.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The source position, where one applies.
    #[must_use]
    pub fn pos(&self) -> Option<Pos> {
        self.pos
    }

    /// Returns true when this is a parse error caused by the source ending
    /// mid-statement, meaning more input could complete it.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "error: {} ({pos})", self.message),
            None => write!(f, "error: {}", self.message),
        }
    }
}

impl std::error::Error for Error {}
