use crate::config::HttpConfig;
use crate::error::RecoveryError;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};

/// Builds the shared reqwest client from engine HTTP options.
pub fn build_client(config: &HttpConfig) -> Result<Client, RecoveryError> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .default_headers(default_headers())
        .build()
        .map_err(RecoveryError::from)
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("*/*"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let client = build_client(&HttpConfig::default());
        assert!(client.is_ok());
    }
}
