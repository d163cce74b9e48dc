use serde_json::json;

/// Failures raised by the domain modules. Every variant maps onto one stable
/// IPC error code so the host can branch on it.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    BadParams {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("unknown viewer {0}")]
    Unauthenticated(String),
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("no active students to notify for")]
    NoActiveStudents,
    #[error("export failed: {0:#}")]
    Export(anyhow::Error),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        ServiceError::BadParams {
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_field(field: &str, message: impl Into<String>) -> Self {
        ServiceError::BadParams {
            message: message.into(),
            details: Some(json!({ "field": field })),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadParams { .. } => "bad_params",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Unauthenticated(_) => "unauthenticated",
            ServiceError::NoWorkspace => "no_workspace",
            ServiceError::NoActiveStudents => "no_active_students",
            ServiceError::Export(_) => "export_failed",
            ServiceError::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ServiceError::BadParams { details, .. } => details.clone(),
            _ => None,
        }
    }
}

/// Maps UNIQUE violations to `Conflict`; everything else stays a db error.
pub fn map_unique(e: rusqlite::Error, what: &str) -> ServiceError {
    if let rusqlite::Error::SqliteFailure(code, _) = &e {
        if code.code == rusqlite::ErrorCode::ConstraintViolation
            && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            return ServiceError::Conflict(format!("{what} already exists"));
        }
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY {
            return ServiceError::Conflict(format!("{what} already exists"));
        }
    }
    ServiceError::Db(e)
}
