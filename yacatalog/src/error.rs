//! Gestion des erreurs pour le client du catalogue

use thiserror::Error;

/// Type Result personnalisé pour yacatalog
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Erreurs possibles lors des appels au catalogue distant
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Token OAuth absent ou refusé
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Ressource non trouvée (station, playlist, track...)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur HTTP (transport)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur renvoyée par l'API
    #[error("Catalog API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// L'appel n'a pas répondu dans le délai imparti
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Erreur générique
    #[error("Catalog error: {0}")]
    Other(String),
}

impl CatalogError {
    /// Crée une erreur API depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Transient failures worth another attempt: transport, timeout, 5xx and rate limit
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Timeout(_) | CatalogError::RateLimitExceeded => true,
            CatalogError::ApiError { code, .. } => *code >= 500,
            CatalogError::Http(err) => {
                if err.is_decode() || err.is_builder() {
                    return false;
                }
                match err.status() {
                    Some(status) => status.is_server_error() || status.as_u16() == 429,
                    None => true,
                }
            }
            _ => false,
        }
    }

    /// Vérifie si l'erreur est une erreur de credentials (401/403)
    pub fn is_auth_error(&self) -> bool {
        matches!(self, CatalogError::Unauthorized(_))
    }
}
