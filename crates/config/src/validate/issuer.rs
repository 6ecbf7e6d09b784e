//! Issuer endpoint validation
//!
//! Checks that the renewal endpoint is a usable URL and that its host
//! accepts TCP connections.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Validate the issuer endpoint
pub async fn validate_issuer(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    let Some(ref endpoint) = config.issuer.endpoint else {
        return result;
    };

    let url = match Url::parse(endpoint) {
        Ok(url) => url,
        Err(e) => {
            result.add_error(ValidationError::new(
                ErrorCategory::Issuer,
                format!("Invalid issuer endpoint '{}': {}", endpoint, e),
            ));
            return result;
        }
    };

    if !matches!(url.scheme(), "http" | "https") {
        result.add_error(ValidationError::new(
            ErrorCategory::Issuer,
            format!(
                "Issuer endpoint '{}' must use http or https, not '{}'",
                endpoint,
                url.scheme()
            ),
        ));
        return result;
    }

    if url.scheme() == "http" && config.issuer.auth_token.is_some() {
        result.add_warning(ValidationWarning::new(format!(
            "Issuer auth token is sent over plain HTTP to '{}'",
            endpoint
        )));
    }

    if config.issuer.dry_run {
        return result;
    }

    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        result.add_error(ValidationError::new(
            ErrorCategory::Issuer,
            format!("Issuer endpoint '{}' has no host", endpoint),
        ));
        return result;
    };

    match timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            result.add_error(ValidationError::new(
                ErrorCategory::Network,
                format!("Issuer '{}:{}' unreachable: {}", host, port, e),
            ));
        }
        Err(_) => {
            result.add_warning(ValidationWarning::new(format!(
                "Issuer '{}:{}' connection timeout ({}s)",
                host,
                port,
                CONNECT_TIMEOUT.as_secs()
            )));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_endpoint(endpoint: &str) -> Config {
        let mut config = Config::default_for_testing();
        config.issuer.endpoint = Some(endpoint.to_string());
        config.issuer.dry_run = false;
        config
    }

    #[tokio::test]
    async fn test_no_endpoint_is_not_an_error() {
        let result = validate_issuer(&Config::default_for_testing()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = validate_issuer(&config_with_endpoint("not a url")).await;
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("Invalid issuer endpoint")));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let result = validate_issuer(&config_with_endpoint("ftp://issuer.local/renew")).await;
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("must use http or https")));
    }

    #[tokio::test]
    async fn test_unreachable_issuer() {
        // Port 1 on localhost is essentially never listening
        let result = validate_issuer(&config_with_endpoint("http://127.0.0.1:1/renew")).await;
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == ErrorCategory::Network));
    }

    #[tokio::test]
    async fn test_dry_run_skips_connect_check() {
        let mut config = config_with_endpoint("http://127.0.0.1:1/renew");
        config.issuer.dry_run = true;

        let result = validate_issuer(&config).await;

        assert!(result.is_ok(), "{:?}", result.errors);
    }

    #[tokio::test]
    async fn test_reachable_issuer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint = format!("http://127.0.0.1:{}/renew", port);
        let result = validate_issuer(&config_with_endpoint(&endpoint)).await;

        assert!(result.is_ok(), "{:?}", result.errors);
    }
}
