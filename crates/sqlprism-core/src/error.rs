//! Analysis error kinds
//!
//! Every kind carries a stable short code modelled on PostgreSQL's SQLSTATE
//! values. Codes are part of the public API: callers match on them to decide
//! whether a failure is a missing object, a collision, or a resolution error.

/// The kind of a catalog or analysis failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("relation \"{0}\" already exists")]
    RelationExists(String),

    #[error("relation \"{0}\" does not exist")]
    RelationNotFound(String),

    #[error("schema \"{0}\" already exists")]
    SchemaExists(String),

    #[error("schema \"{0}\" does not exist")]
    SchemaNotFound(String),

    #[error("type \"{0}\" already exists")]
    TypeExists(String),

    #[error("type \"{0}\" does not exist")]
    TypeNotFound(String),

    #[error("column \"{column}\" of relation \"{relation}\" already exists")]
    ColumnExists { relation: String, column: String },

    #[error("column \"{column}\" of relation \"{relation}\" does not exist")]
    ColumnNotFound { relation: String, column: String },

    #[error("enum label \"{0}\" already exists")]
    EnumValueExists(String),

    #[error("\"{0}\" is not an existing enum label")]
    EnumValueNotFound(String),

    #[error("column \"{0}\" does not exist")]
    ColumnDoesNotExist(String),

    #[error("column reference \"{0}\" is ambiguous")]
    AmbiguousColumnReference(String),

    #[error("column reference \"{0}\" not found")]
    ColumnReferenceNotFound(String),

    #[error("table name \"{0}\" specified more than once")]
    DuplicateAlias(String),

    #[error("function \"{0}\" does not exist")]
    FunctionNotFound(String),

    /// A function exists by name but none of its overloads accepts the call
    #[error("function {0} does not exist")]
    NoMatchingFunction(String),

    #[error("function \"{0}\" already exists with same argument types")]
    FunctionExists(String),

    #[error("function name \"{0}\" is not unique")]
    FunctionNotUnique(String),

    #[error("could not determine data type of parameter ${0}")]
    UndeterminedParameter(usize),

    #[error("unsupported statement type: {0}")]
    UnsupportedStatementType(String),

    /// Malformed input that does not fit any other kind
    #[error("{0}")]
    Invalid(String),
}

impl ErrorKind {
    /// Stable SQLSTATE-like code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::RelationExists(_) => "42P07",
            Self::RelationNotFound(_) => "42P01",
            Self::SchemaExists(_) => "42P06",
            Self::SchemaNotFound(_) => "3F000",
            Self::TypeExists(_) | Self::EnumValueExists(_) => "42710",
            Self::TypeNotFound(_) => "42704",
            Self::ColumnExists { .. } => "42701",
            Self::ColumnNotFound { .. }
            | Self::ColumnDoesNotExist(_)
            | Self::AmbiguousColumnReference(_)
            | Self::ColumnReferenceNotFound(_) => "42703",
            Self::EnumValueNotFound(_) => "22023",
            Self::DuplicateAlias(_) => "42712",
            Self::FunctionNotFound(_) | Self::NoMatchingFunction(_) => "42883",
            Self::FunctionExists(_) => "42723",
            Self::FunctionNotUnique(_) => "42725",
            Self::UndeterminedParameter(_) => "42P18",
            Self::UnsupportedStatementType(_) => "0A000",
            Self::Invalid(_) => "XX000",
        }
    }

    /// The identifier the error is about, if any
    ///
    /// Used to recover a source location when the analyzer did not track one.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::RelationExists(s)
            | Self::RelationNotFound(s)
            | Self::SchemaExists(s)
            | Self::SchemaNotFound(s)
            | Self::TypeExists(s)
            | Self::TypeNotFound(s)
            | Self::ColumnDoesNotExist(s)
            | Self::AmbiguousColumnReference(s)
            | Self::ColumnReferenceNotFound(s)
            | Self::DuplicateAlias(s)
            | Self::FunctionNotFound(s)
            | Self::FunctionExists(s)
            | Self::FunctionNotUnique(s) => Some(s),
            Self::ColumnExists { column, .. } | Self::ColumnNotFound { column, .. } => Some(column),
            _ => None,
        }
    }
}

/// An error produced while folding DDL or analyzing a query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct SqlError {
    /// What went wrong
    pub kind: ErrorKind,

    /// Byte offset into the statement or file text, when known
    pub location: Option<usize>,
}

impl SqlError {
    /// Create an error without a location
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, location: None }
    }

    /// Shorthand for [`ErrorKind::Invalid`]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid(message.into()))
    }

    /// Set the location, replacing any previous one
    pub fn with_location(mut self, location: usize) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the location only if none is recorded yet
    pub fn or_location(mut self, location: Option<usize>) -> Self {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }

    /// Stable code of the underlying kind
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// True for every "does not exist" style lookup failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RelationNotFound(_)
                | ErrorKind::SchemaNotFound(_)
                | ErrorKind::TypeNotFound(_)
                | ErrorKind::ColumnNotFound { .. }
                | ErrorKind::FunctionNotFound(_)
        )
    }

    /// True for every "already exists" collision
    pub fn is_exists(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RelationExists(_)
                | ErrorKind::SchemaExists(_)
                | ErrorKind::TypeExists(_)
                | ErrorKind::ColumnExists { .. }
                | ErrorKind::FunctionExists(_)
        )
    }
}

impl From<ErrorKind> for SqlError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result alias used across the analyzer crates
pub type Result<T, E = SqlError> = std::result::Result<T, E>;
