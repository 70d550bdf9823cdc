//! Purpose: Crate-wide error type with stable kinds.
//! Exports: `Error`, `ErrorKind`, `BoxError`, `error_kind_code`.
//! Role: Every fallible sidecar operation returns `Result<_, Error>`.
//! Invariants: Kind codes are stable once published; new kinds are appended.
use std::error::Error as StdError;
use std::fmt;

/// Error type the collaborator node reports back through `FinalityNode::run`.
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NotInitialized,
    AlreadyInitialized,
    AlreadyRunning,
    Cancelled,
    UnknownSubsystem,
    Node,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    subsystem: Option<String>,
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            subsystem: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.subsystem.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_boxed_source(mut self, source: BoxError) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(subsystem) = &self.subsystem {
            write!(f, " (subsystem: {subsystem})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn error_kind_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NotInitialized => 3,
        ErrorKind::AlreadyInitialized => 4,
        ErrorKind::AlreadyRunning => 5,
        ErrorKind::Cancelled => 6,
        ErrorKind::UnknownSubsystem => 7,
        ErrorKind::Node => 8,
    }
}
