use thiserror::Error;

/// Failure reported by a collaborator (catalog, analytics store, interaction log).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator returned undecodable data: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TrainingError {
    #[error("trainer failed: {0}")]
    Failed(String),
    #[error("trainer did not finish within {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },
    #[error("trainer input unavailable: {0}")]
    Source(#[from] CollaboratorError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("catalog fetch failed: {0}")]
    CatalogFetch(#[source] CollaboratorError),
    #[error("analytics fetch failed: {0}")]
    AnalyticsFetch(#[source] CollaboratorError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error("recommendation upsert failed: {0}")]
    Upsert(#[source] CollaboratorError),
}

impl RecommendationError {
    /// Stable label for the `error_kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CatalogFetch(_) | Self::AnalyticsFetch(_) => "upstream_fetch",
            Self::Training(_) => "training",
            Self::Upsert(_) => "upsert",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::Internal {
            message: self.to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Internal { .. } => "Failed to fetch recommended products",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Unauthorized { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }
}
