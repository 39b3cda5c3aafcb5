use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::import::graphql::{
    GraphqlRequest, GraphqlResponse, ImportType, UploadImportFileData, UploadImportFileResult,
    UploadImportFileVariables, UNAUTHENTICATED_CODE, UNAUTHORIZED_CODE,
    UPLOAD_IMPORT_FILE_MUTATION,
};
use crate::util::{url_without_query, validate_endpoint, EndpointError};

/// Production GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api-prod.omnivore.app/api/graphql";

const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB

#[derive(Debug, Error)]
pub enum ImportError {
    /// The API endpoint or the signed upload URL is unusable.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),

    /// Transport failure while requesting the signed URL.
    #[error("GraphQL request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The response body is not JSON.
    #[error("Failed to decode GraphQL response (HTTP status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The response is JSON but not in the expected shape.
    #[error("Unexpected GraphQL response: {0}")]
    Protocol(String),

    /// The token was rejected.
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// The server answered with the error branch of `uploadImportFile`.
    #[error("Import rejected with error codes: {}", .0.join(", "))]
    Rejected(Vec<String>),

    /// Response body exceeded the 1MB limit.
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),

    /// Transport failure while uploading the CSV.
    #[error("Upload request failed: {0}")]
    Upload(#[source] reqwest::Error),

    /// The signed URL answered the PUT with a non-2xx status.
    #[error("Upload failed: HTTP status {0}")]
    UploadStatus(u16),
}

/// Client for the two-step import protocol: request a signed URL, then PUT the CSV to it.
///
/// Neither step is retried. Each call to [`ImportClient::request_signed_url`]
/// issues a new signed URL on the server.
pub struct ImportClient {
    http: reqwest::Client,
    api_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for ImportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportClient")
            .field("api_url", &self.api_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl ImportClient {
    /// Builds a client for `api_url`, which must pass [`validate_endpoint`].
    pub fn new(api_url: &Url, token: SecretString) -> Result<Self, ImportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::limited(3))
            .build()
            .map_err(ImportError::Request)?;
        Self::with_http_client(http, api_url, token)
    }

    /// Same as [`ImportClient::new`] with a caller-supplied HTTP client.
    pub fn with_http_client(
        http: reqwest::Client,
        api_url: &Url,
        token: SecretString,
    ) -> Result<Self, ImportError> {
        let api_url = validate_endpoint(api_url.as_str())?;
        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    /// Runs the `UploadImportFile` mutation and returns the signed upload URL.
    ///
    /// # Errors
    ///
    /// - [`ImportError::Request`] on transport failure
    /// - [`ImportError::Auth`] on HTTP 401/403, an `UNAUTHENTICATED` GraphQL error,
    ///   or an `UNAUTHORIZED` error code
    /// - [`ImportError::Decode`] if the body is not JSON
    /// - [`ImportError::Protocol`] if neither the success nor the error branch is present
    /// - [`ImportError::Rejected`] with the server's error codes
    pub async fn request_signed_url(&self) -> Result<Url, ImportError> {
        let request = GraphqlRequest {
            query: UPLOAD_IMPORT_FILE_MUTATION,
            variables: UploadImportFileVariables::default(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| ImportError::Protocol(format!("failed to encode request: {}", e)))?;

        tracing::debug!(api_url = %self.api_url, "Requesting signed upload URL");
        let response = self
            .http
            .post(self.api_url.clone())
            .header(AUTHORIZATION, self.token.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ImportError::Request)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ImportError::Auth(format!("HTTP status {}", status.as_u16())));
        }

        let bytes = read_limited_body(response, MAX_RESPONSE_SIZE).await?;
        let signed_url = decode_signed_url(status, &bytes)?;
        let signed_url = validate_endpoint(&signed_url)?;

        tracing::info!(
            upload_url = %url_without_query(&signed_url),
            "Received signed upload URL"
        );
        Ok(signed_url)
    }

    /// PUTs `payload` to a signed URL with `Content-Type: text/csv`.
    ///
    /// The import type is repeated in a `type` header next to the body.
    pub async fn upload(&self, signed_url: &Url, payload: Vec<u8>) -> Result<(), ImportError> {
        let size = payload.len();
        let response = self
            .http
            .put(signed_url.clone())
            .header(CONTENT_TYPE, "text/csv")
            .header("type", ImportType::UrlList.as_str())
            .body(payload)
            .send()
            .await
            .map_err(ImportError::Upload)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Upload rejected by storage");
            return Err(ImportError::UploadStatus(status.as_u16()));
        }

        tracing::info!(bytes = size, status = status.as_u16(), "Uploaded CSV");
        Ok(())
    }
}

/// Interprets a GraphQL response body as the `uploadImportFile` result.
fn decode_signed_url(status: StatusCode, bytes: &[u8]) -> Result<String, ImportError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|source| ImportError::Decode {
            status: status.as_u16(),
            source,
        })?;
    let response: GraphqlResponse<UploadImportFileData> = serde_json::from_value(value)
        .map_err(|e| ImportError::Protocol(format!("HTTP status {}: {}", status.as_u16(), e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        if response
            .errors
            .iter()
            .any(|e| e.code() == Some(UNAUTHENTICATED_CODE))
        {
            return Err(ImportError::Auth(messages.join("; ")));
        }
        return Err(ImportError::Protocol(messages.join("; ")));
    }

    match response.data.and_then(|d| d.upload_import_file) {
        Some(UploadImportFileResult::Success { upload_signed_url }) => Ok(upload_signed_url),
        Some(UploadImportFileResult::Error { error_codes }) => {
            if error_codes.iter().any(|c| c == UNAUTHORIZED_CODE) {
                Err(ImportError::Auth(error_codes.join(", ")))
            } else {
                Err(ImportError::Rejected(error_codes))
            }
        }
        None => Err(ImportError::Protocol(format!(
            "HTTP status {}: missing data.uploadImportFile",
            status.as_u16()
        ))),
    }
}

async fn read_limited_body(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ImportError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ImportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ImportError::Request)?;
        // SEC-003: Use saturating_add to prevent integer overflow in size check
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ImportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
