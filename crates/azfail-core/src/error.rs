use thiserror::Error;

use crate::service::Service;

#[derive(Error, Debug)]
pub enum AzError {
    #[error("[{service}] Configuration error: {message}")]
    Config { service: Service, message: String },

    #[error("[{service}] Discovery failed: {message}")]
    Discovery { service: Service, message: String },

    #[error("[{service}] State file error: {message}")]
    StateFile { service: Service, message: String },

    #[error("[{service}] Unsupported resource: {message}")]
    Unsupported { service: Service, message: String },

    #[error("[{service}] Rollback blocked: {message}")]
    RollbackBlocked { service: Service, message: String },

    #[error("[{service}] API call failed: {source}")]
    Api {
        service: Service,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AzError {
    pub fn config(service: Service, message: impl Into<String>) -> Self {
        Self::Config {
            service,
            message: message.into(),
        }
    }

    pub fn discovery(service: Service, message: impl Into<String>) -> Self {
        Self::Discovery {
            service,
            message: message.into(),
        }
    }

    pub fn state_file(service: Service, message: impl Into<String>) -> Self {
        Self::StateFile {
            service,
            message: message.into(),
        }
    }

    pub fn unsupported(service: Service, message: impl Into<String>) -> Self {
        Self::Unsupported {
            service,
            message: message.into(),
        }
    }

    pub fn rollback_blocked(service: Service, message: impl Into<String>) -> Self {
        Self::RollbackBlocked {
            service,
            message: message.into(),
        }
    }

    pub fn api(service: Service, source: impl Into<anyhow::Error>) -> Self {
        Self::Api {
            service,
            source: source.into(),
        }
    }
}

pub type AzResult<T> = Result<T, AzError>;
