//! Typed request and response schema for the `uploadImportFile` mutation.

use serde::{Deserialize, Serialize};

/// Requests a signed URL for a direct CSV upload.
pub const UPLOAD_IMPORT_FILE_MUTATION: &str = r#"
mutation UploadImportFile($type: UploadImportFileType!, $contentType: String!) {
  uploadImportFile(type: $type, contentType: $contentType) {
    ... on UploadImportFileError {
      errorCodes
    }
    ... on UploadImportFileSuccess {
      uploadSignedUrl
    }
  }
}
"#;

/// Error code the server uses for a rejected token.
pub const UNAUTHORIZED_CODE: &str = "UNAUTHORIZED";

/// GraphQL-level code for a missing or invalid token.
pub const UNAUTHENTICATED_CODE: &str = "UNAUTHENTICATED";

#[derive(Debug, Serialize)]
pub struct GraphqlRequest<'a, V> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportType {
    UrlList,
}

impl ImportType {
    /// Wire name, as sent in the mutation variables and the upload `type` header.
    pub fn as_str(self) -> &'static str {
        match self {
            ImportType::UrlList => "URL_LIST",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImportFileVariables {
    #[serde(rename = "type")]
    pub import_type: ImportType,
    pub content_type: &'static str,
}

impl Default for UploadImportFileVariables {
    fn default() -> Self {
        Self {
            import_type: ImportType::UrlList,
            content_type: "text/csv",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphqlErrorExtensions>,
}

impl GraphqlError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.code.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphqlErrorExtensions {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImportFileData {
    pub upload_import_file: Option<UploadImportFileResult>,
}

/// Union result of `uploadImportFile`: a signed URL or a list of error codes.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum UploadImportFileResult {
    #[serde(rename_all = "camelCase")]
    Success { upload_signed_url: String },
    #[serde(rename_all = "camelCase")]
    Error { error_codes: Vec<String> },
}
