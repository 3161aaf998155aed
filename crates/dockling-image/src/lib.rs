//! # dockling-image
//!
//! Pulls container images from a registry and materializes them as a root
//! directory.
//!
//! Handles:
//! - **References**: `namespace/name:tag` parsing with Docker Hub defaults.
//! - **Registry**: anonymous pull token, manifest and blob retrieval.
//! - **Manifests**: schema 1, schema 2, OCI and manifest lists.
//! - **Hashing**: digest verification of downloaded blobs.
//! - **Staging**: temporary storage of blobs until extraction.
//! - **Layers**: tar / tar+gzip extraction, base layer first.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod hash;
pub mod layer;
pub mod manifest;
pub mod materialize;
pub mod reference;
pub mod registry;
pub mod staging;

pub use error::{ImageError, ImageResult, RegistryFailure};
pub use materialize::{AppliedLayer, MaterializedImage, Materializer};
pub use reference::ImageReference;
