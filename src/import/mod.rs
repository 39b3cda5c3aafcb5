//! Upload client for the remote import API.
//!
//! The protocol has two steps, run once each:
//!
//! 1. POST the `UploadImportFile` GraphQL mutation to obtain a signed URL
//! 2. PUT the CSV payload to that URL
//!
//! - [`graphql`] - Typed request/response schema (success vs. error branch)
//! - [`client`] - [`ImportClient`] performing both steps with `reqwest`

mod client;
pub mod graphql;

pub use client::{ImportClient, ImportError, DEFAULT_API_URL};
