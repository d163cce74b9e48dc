use crate::error::{ServiceError, ServiceResult};
use crate::model::User;
use rusqlite::types::Value;

/// Who is asking. Built from the `users` row matching the host-supplied id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id_number: String,
    pub is_school_staff: bool,
    pub is_superuser: bool,
}

impl Viewer {
    pub fn is_school(&self) -> bool {
        self.is_superuser || self.is_school_staff
    }

    pub fn require_school(&self) -> ServiceResult<()> {
        if self.is_school() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "school staff access required".to_string(),
            ))
        }
    }
}

impl From<&User> for Viewer {
    fn from(u: &User) -> Self {
        Self {
            id_number: u.id_number.clone(),
            is_school_staff: u.is_school_staff,
            is_superuser: u.is_superuser,
        }
    }
}

/// Which late arrivals a viewer may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Reporter(String),
}

impl Scope {
    /// SQL fragment over `column` plus its bound values. `All` is a no-op
    /// predicate so callers can always `AND` it in.
    pub fn sql(&self, column: &str) -> (String, Vec<Value>) {
        match self {
            Scope::All => ("1 = 1".to_string(), Vec::new()),
            Scope::Reporter(id) => (format!("{} = ?", column), vec![Value::Text(id.clone())]),
        }
    }
}

pub trait AccessPolicy {
    fn scope(&self, viewer: &Viewer) -> Scope;
}

/// Staff and superusers see everything; responsibles only their own notices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchoolPolicy;

impl AccessPolicy for SchoolPolicy {
    fn scope(&self, viewer: &Viewer) -> Scope {
        if viewer.is_school() {
            Scope::All
        } else {
            Scope::Reporter(viewer.id_number.clone())
        }
    }
}
