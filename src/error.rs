// Registry errors - domain rejections vs. system faults
//
// Validation / Conflict / NotFound are domain rejections: the caller can
// fix its input or its lookup. Storage is a system fault and travels up
// untouched.

use crate::validation::FieldError;
use thiserror::Error;

/// Result alias used by every use-case and repository call
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Field guarded by a uniqueness invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    TaxId,
    Email,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::TaxId => "taxId",
            UniqueField::Email => "email",
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Input shape is wrong; carries every violated rule, not just the first
    #[error("validation failed: {}", join_messages(.0))]
    Validation(Vec<FieldError>),

    /// A uniqueness invariant would be broken
    #[error("a company with this {field} already exists")]
    Conflict { field: UniqueField },

    #[error("{entity} with ID {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Persistence collaborator failed for a reason unrelated to domain rules
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl RegistryError {
    pub fn company_not_found(id: &str) -> Self {
        RegistryError::NotFound {
            entity: "Company",
            id: id.to_string(),
        }
    }

    /// Domain rejections are recoverable by the caller; storage faults are not
    pub fn is_domain(&self) -> bool {
        !matches!(self, RegistryError::Storage(_))
    }

    /// Field errors of a validation failure (empty for other kinds)
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            RegistryError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
