use thiserror::Error;

use crate::storage::RepositoryError;

/// Errors surfaced by request dispatch and handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The requested entity does not exist or is soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// An active entity with the same unique key already exists.
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },
    /// The caller holds none of the roles the request requires.
    #[error("Unauthorized request: {request}")]
    Unauthorized { request: &'static str },
    /// The request carries invalid data.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// No handler is registered for the request type.
    #[error("No handler registered for request: {request}")]
    HandlerNotFound { request: &'static str },
    /// The storage backend failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// The request was cancelled before completion.
    #[error("Request cancelled")]
    Cancelled,
}

impl From<RepositoryError> for AppError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity_type, id } => AppError::NotFound {
                entity: entity_type,
                id,
            },
            RepositoryError::AlreadyExists { entity_type, id } => AppError::Duplicate {
                entity: entity_type,
                key: id,
            },
            other => AppError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = AppError::NotFound {
            entity: "Branch",
            id: "3".to_string(),
        };
        assert_eq!(error.to_string(), "Branch not found: 3");
    }

    #[test]
    fn test_unauthorized_display() {
        let error = AppError::Unauthorized {
            request: "CreateBranch",
        };
        assert_eq!(error.to_string(), "Unauthorized request: CreateBranch");
    }

    #[test]
    fn test_handler_not_found_display() {
        let error = AppError::HandlerNotFound {
            request: "ListBranches",
        };
        assert_eq!(
            error.to_string(),
            "No handler registered for request: ListBranches"
        );
    }

    #[test]
    fn test_repository_not_found_keeps_kind() {
        let repo_error = RepositoryError::NotFound {
            entity_type: "Doctor",
            id: "9".to_string(),
        };
        let error: AppError = repo_error.into();
        assert_eq!(
            error,
            AppError::NotFound {
                entity: "Doctor",
                id: "9".to_string()
            }
        );
    }

    #[test]
    fn test_repository_already_exists_keeps_kind() {
        let repo_error = RepositoryError::AlreadyExists {
            entity_type: "Branch",
            id: "3".to_string(),
        };
        let error: AppError = repo_error.into();
        assert_eq!(
            error,
            AppError::Duplicate {
                entity: "Branch",
                key: "3".to_string()
            }
        );
    }

    #[test]
    fn test_repository_query_failed_maps_to_persistence() {
        let repo_error = RepositoryError::QueryFailed("disk gone".to_string());
        let error: AppError = repo_error.into();
        assert!(matches!(error, AppError::Persistence(_)));
    }
}
