use hls_manifest::ParseError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("playlist error: {source}")]
    Playlist {
        #[from]
        source: ParseError,
    },

    #[error("segment fetch error: {reason}")]
    SegmentFetch { reason: String, retryable: bool },

    #[error("decryption error: {reason}")]
    Decryption { reason: String },

    #[error("task source error: {reason}")]
    TaskSource { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl RecoveryError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption {
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled => false,
            Self::InvalidUrl { .. } | Self::Playlist { .. } | Self::Decryption { .. } => false,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::SegmentFetch { retryable, .. } => *retryable,
            Self::Network { .. }
            | Self::Io { .. }
            | Self::TaskSource { .. }
            | Self::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retryable() {
        let err = RecoveryError::http_status(StatusCode::NOT_FOUND, "https://h/seg.ts", "segment");
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        let err =
            RecoveryError::http_status(StatusCode::BAD_GATEWAY, "https://h/seg.ts", "segment");
        assert!(err.is_retryable());
        let err = RecoveryError::http_status(
            StatusCode::TOO_MANY_REQUESTS,
            "https://h/seg.ts",
            "segment",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn parse_and_decrypt_failures_are_permanent() {
        assert!(!RecoveryError::from(ParseError::Empty).is_retryable());
        assert!(!RecoveryError::decryption("bad key length").is_retryable());
    }
}
