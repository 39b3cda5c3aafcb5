//! Utility functions shared by the import client and the CLI.
//!
//! - **Endpoint validation**: scheme checks for URLs that receive credentials or payloads

mod url_validator;

pub use url_validator::{url_without_query, validate_endpoint, EndpointError};
