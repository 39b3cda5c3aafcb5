use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during endpoint validation.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a URL that will receive the API token or the CSV payload.
///
/// - Only `http`/`https` schemes are accepted
/// - SEC-002: Plain `http` to a host other than `localhost`, `127.0.0.1` or
///   `::1` is accepted for self-hosted servers but logged as a warning
///
/// # Examples
///
/// ```
/// use hatebu_import::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://api-prod.omnivore.app/api/graphql").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:8080/api/graphql").is_ok());
/// assert!(validate_endpoint("http://omnivore.lan/api/graphql").is_ok());
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback_host(&url) => Ok(url),
        "http" => {
            tracing::warn!(
                endpoint = %url_without_query(&url),
                "Using non-HTTPS endpoint; traffic is not encrypted"
            );
            Ok(url)
        }
        scheme => Err(EndpointError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Renders a URL for logs with query and fragment removed.
///
/// Signed upload URLs carry their credentials in the query string.
pub fn url_without_query(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.set_fragment(None);
    redacted.to_string()
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
