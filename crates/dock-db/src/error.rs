use dock_entitlement::EntitlementDenied;
use dock_import::ImportError;
use dock_reconcile::{ReconcileError, UnknownValue};

/// Failure taxonomy shared by every repository function. The HTTP layer maps
/// each variant to one status code.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Missing, or owned by another organization.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        DomainError::InvalidState(msg.into())
    }

    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidState(_) => "invalid_state",
            DomainError::Validation(_) => "validation_failed",
            DomainError::PaymentRequired(_) => "payment_required",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Db(_) | DomainError::Internal(_) => "internal",
        }
    }
}

impl From<EntitlementDenied> for DomainError {
    fn from(e: EntitlementDenied) -> Self {
        let msg = match e {
            EntitlementDenied::Inactive => {
                "An active subscription is required to add vessels. Upgrade your plan or contact DockOps support."
                    .to_string()
            }
            EntitlementDenied::LimitReached { limit, current } => format!(
                "Vessel limit reached ({current} of {limit}). Upgrade your plan or contact DockOps support."
            ),
        };
        DomainError::PaymentRequired(msg)
    }
}

impl From<ReconcileError> for DomainError {
    fn from(e: ReconcileError) -> Self {
        if e.is_invalid_state() {
            DomainError::InvalidState(e.to_string())
        } else {
            DomainError::Validation(e.to_string())
        }
    }
}

/// Upload-level import failures reject the whole file as bad input.
impl From<ImportError> for DomainError {
    fn from(e: ImportError) -> Self {
        DomainError::Validation(e.to_string())
    }
}

/// A stored enum column with an unexpected value is corrupt data, not bad input.
impl From<UnknownValue> for DomainError {
    fn from(e: UnknownValue) -> Self {
        DomainError::Internal(anyhow::Error::new(e).context("unexpected stored value"))
    }
}
