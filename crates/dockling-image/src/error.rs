//! Error types for image resolution and materialization.
//!
//! [`ImageError`] identifies the step that failed (auth, manifest, blob,
//! staging, extraction) and, where layers are involved, the layer index.
//! [`RegistryFailure`] describes what went wrong on the wire.

use std::path::PathBuf;

use thiserror::Error;

/// What went wrong while talking to the registry or decoding its answer.
#[derive(Debug, Error)]
pub enum RegistryFailure {
    /// The HTTP request could not be completed.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The registry answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body is not JSON at all.
    #[error("response body is not valid JSON: {source}")]
    MalformedBody {
        /// Parser error.
        source: serde_json::Error,
    },

    /// A required field is absent from the response.
    #[error("response is missing field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field is present but does not have the expected shape.
    #[error("field `{field}` is malformed: {source}")]
    InvalidField {
        /// Name of the malformed field.
        field: &'static str,
        /// Decoder error describing the mismatch.
        source: serde_json::Error,
    },

    /// A digest string is not of the form `<algorithm>:<hex>`.
    #[error("`{value}` is not a digest of the form <algorithm>:<hex>")]
    InvalidDigest {
        /// The rejected value.
        value: String,
    },

    /// Downloaded content does not hash to its digest.
    #[error("content digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Digest the content was requested by.
        expected: String,
        /// Digest of the bytes actually received.
        actual: String,
    },

    /// A manifest list offers no image for the configured platform.
    #[error("manifest list has no entry for platform {platform}")]
    NoMatchingPlatform {
        /// Requested platform (`os/architecture`).
        platform: String,
    },

    /// The manifest selected from a manifest list is itself a list.
    #[error("manifest {digest} selected from a manifest list is itself a manifest list")]
    NestedIndex {
        /// Digest of the offending entry.
        digest: String,
    },

    /// The manifest lists more layers than Dockling accepts.
    #[error("manifest lists {count} layers, more than the limit of {limit}")]
    TooManyLayers {
        /// Number of layers in the manifest.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },
}

/// A failure while resolving or materializing an image.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image reference string cannot be parsed.
    #[error("invalid image reference `{reference}`: {reason}")]
    InvalidReference {
        /// The rejected reference.
        reference: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build registry client: {source}")]
    Client {
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// Obtaining a pull token failed.
    #[error("authentication for {repository} failed: {source}")]
    Auth {
        /// Repository the token was requested for.
        repository: String,
        /// What went wrong.
        source: RegistryFailure,
    },

    /// Fetching or decoding the manifest failed.
    #[error("manifest {repository}:{reference} could not be retrieved: {source}")]
    Manifest {
        /// Repository of the image.
        repository: String,
        /// Tag or digest requested.
        reference: String,
        /// What went wrong.
        source: RegistryFailure,
    },

    /// Downloading (or verifying) one layer blob failed.
    #[error("layer {index} ({digest}) could not be fetched: {source}")]
    BlobFetch {
        /// Position of the layer in the manifest.
        index: usize,
        /// Digest of the layer.
        digest: String,
        /// What went wrong.
        source: RegistryFailure,
    },

    /// The staging area could not be created or written.
    #[error("staging failed at {path}: {source}")]
    Staging {
        /// Path of the failing operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Unpacking one layer archive failed.
    #[error("extracting layer {index} from {path} failed: {source}")]
    Extraction {
        /// Position of the layer in the manifest.
        index: usize,
        /// Staged archive that failed to unpack.
        path: PathBuf,
        /// Underlying I/O or archive error.
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the image crate.
pub type ImageResult<T> = std::result::Result<T, ImageError>;
