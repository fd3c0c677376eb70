//! Typed errors for talking to the Imagineer backend.
//!
//! Configuration and CLI plumbing use `anyhow`; anything a fetch callback
//! needs to classify (auth vs. transient) is an [`ApiError`].

use thiserror::Error;

/// Errors from a single REST call against the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Admin access required ({status} from {endpoint})")]
    Unauthorized { status: u16, endpoint: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("Request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid API base URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
}

impl ApiError {
    /// 401/403: retrying without new credentials is pointless.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Network trouble or a 5xx: worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_auth_not_transient() {
        let err = ApiError::Unauthorized {
            status: 403,
            endpoint: "/api/training".to_string(),
        };
        assert!(err.is_auth());
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("Admin access required"));
    }

    #[test]
    fn test_server_errors_are_transient() {
        let err = ApiError::Status {
            status: 503,
            endpoint: "/api/jobs".to_string(),
            body: "unavailable".to_string(),
        };
        assert!(err.is_transient());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let err = ApiError::Status {
            status: 404,
            endpoint: "/api/scraping/jobs".to_string(),
            body: String::new(),
        };
        assert!(!err.is_transient());
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_invalid_base_url_carries_url() {
        let err = ApiError::InvalidBaseUrl {
            url: "ftp://x".to_string(),
            message: "scheme must be http or https".to_string(),
        };
        match &err {
            ApiError::InvalidBaseUrl { url, .. } => assert_eq!(url, "ftp://x"),
            _ => panic!("Expected InvalidBaseUrl"),
        }
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_api_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        let err = ApiError::Unauthorized {
            status: 401,
            endpoint: "/api/jobs".to_string(),
        };
        assert_std_error(&err);
    }
}
