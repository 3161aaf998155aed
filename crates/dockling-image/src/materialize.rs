//! Image materialization.
//!
//! Turns an image reference into a populated root directory: every layer
//! blob is downloaded and staged first, then the archives are applied from
//! the base layer up so that upper layers win.

use std::path::{Path, PathBuf};

use dockling_common::config::DocklingConfig;

use crate::error::{ImageError, ImageResult};
use crate::layer;
use crate::manifest::LayerDigest;
use crate::reference::ImageReference;
use crate::registry::RegistryClient;
use crate::staging::StagingArea;

/// One layer written into the target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedLayer {
    /// Position of the layer in the manifest (0 is the topmost layer).
    pub index: usize,
    /// Digest the blob was fetched by.
    pub digest: LayerDigest,
    /// Size of the staged archive in bytes.
    pub size_bytes: u64,
}

/// Outcome of a successful materialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedImage {
    /// The parsed reference that was pulled.
    pub reference: ImageReference,
    /// Applied layers, in extraction order (base first).
    pub layers: Vec<AppliedLayer>,
}

impl MaterializedImage {
    /// Sum of the archive sizes of all applied layers.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.layers.iter().map(|l| l.size_bytes).sum()
    }
}

/// Pulls images from one registry into local directories.
#[derive(Debug, Clone)]
pub struct Materializer {
    client: RegistryClient,
    staging_dir: Option<PathBuf>,
}

impl Materializer {
    /// Builds a materializer for the registry and staging location in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Client`] if the registry client cannot be built.
    pub fn new(config: &DocklingConfig) -> ImageResult<Self> {
        Ok(Self {
            client: RegistryClient::new(config)?,
            staging_dir: config.staging_dir.clone(),
        })
    }

    /// Fetches `image_ref` and extracts its layers into `target`.
    ///
    /// All blobs are downloaded before anything is extracted, so a fetch
    /// failure leaves `target` untouched. An extraction failure is not
    /// rolled back. The staging area is removed on every path.
    ///
    /// # Errors
    ///
    /// Returns the [`ImageError`] of the first step that failed; layer
    /// failures carry the index of the offending layer.
    pub fn materialize(&self, image_ref: &str, target: &Path) -> ImageResult<MaterializedImage> {
        let reference = ImageReference::parse(image_ref)?;
        let repository = reference.repository();
        tracing::info!(image = %reference, target = %target.display(), "materializing image");

        let token = self.client.fetch_token(&repository)?;
        let manifest = self
            .client
            .fetch_manifest(&repository, &reference.tag, &token)?;
        if manifest.is_empty() {
            tracing::warn!(image = %reference, "manifest lists no layers");
        }

        let staging = StagingArea::create(self.staging_dir.as_deref())?;

        for (index, digest) in manifest.layers.iter().enumerate() {
            let bytes = self
                .client
                .fetch_blob(&repository, digest, &token)
                .map_err(|source| ImageError::BlobFetch {
                    index,
                    digest: digest.to_string(),
                    source,
                })?;
            let _ = staging.stage(index, &bytes)?;
        }
        tracing::debug!(layers = manifest.len(), "all layers staged");

        let mut applied = Vec::with_capacity(manifest.len());
        for (index, digest) in manifest.layers.iter().enumerate().rev() {
            let size_bytes = layer::extract_layer(index, &staging.layer_path(index), target)?;
            applied.push(AppliedLayer {
                index,
                digest: digest.clone(),
                size_bytes,
            });
        }

        staging.release();

        let image = MaterializedImage {
            reference,
            layers: applied,
        };
        tracing::info!(
            image = %image.reference,
            layers = image.layers.len(),
            size = image.total_size(),
            "image materialized"
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use dockling_common::config::RegistryConfig;
    use dockling_common::types::Platform;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::RegistryFailure;
    use crate::hash;

    fn layer_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *data)
                .expect("append entry");
        }
        builder.into_inner().expect("finish tar")
    }

    struct Fixture {
        server: MockServer,
        staging: tempfile::TempDir,
        target: tempfile::TempDir,
    }

    impl Fixture {
        async fn start() -> Self {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t"})))
                .mount(&server)
                .await;
            Self {
                server,
                staging: tempfile::tempdir().expect("staging"),
                target: tempfile::tempdir().expect("target"),
            }
        }

        /// Serves a schema 2 manifest whose `layers` are given base-first.
        async fn serve_image(&self, repository: &str, tag: &str, base_first: &[Vec<u8>]) {
            let mut descriptors = Vec::new();
            for blob in base_first {
                let digest = hash::sha256_digest(blob);
                Mock::given(method("GET"))
                    .and(path(format!("/v2/{repository}/blobs/{digest}")))
                    .respond_with(ResponseTemplate::new(200).set_body_bytes(blob.clone()))
                    .mount(&self.server)
                    .await;
                descriptors.push(json!({"digest": digest.to_string()}));
            }
            Mock::given(method("GET"))
                .and(path(format!("/v2/{repository}/manifests/{tag}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"schemaVersion": 2, "layers": descriptors})),
                )
                .mount(&self.server)
                .await;
        }

        fn config(&self) -> DocklingConfig {
            DocklingConfig {
                registry: RegistryConfig {
                    auth_url: format!("{}/token", self.server.uri()),
                    auth_service: "registry.test".into(),
                    registry_url: self.server.uri(),
                    request_timeout_secs: Some(10),
                },
                staging_dir: Some(self.staging.path().to_path_buf()),
                platform: Platform::host(),
            }
        }

        async fn materialize(&self, image: &'static str) -> ImageResult<MaterializedImage> {
            let config = self.config();
            let target = self.target.path().join("rootfs");
            tokio::task::spawn_blocking(move || Materializer::new(&config)?.materialize(image, &target))
                .await
                .expect("blocking task panicked")
        }

        fn rootfs(&self) -> PathBuf {
            self.target.path().join("rootfs")
        }

        fn staging_is_empty(&self) -> bool {
            std::fs::read_dir(self.staging.path())
                .expect("read staging")
                .next()
                .is_none()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn layers_are_extracted_base_first() {
        let fx = Fixture::start().await;
        let base = layer_tar(&[("etc/motd", b"base"), ("bin/sh", b"shell")]);
        let top = layer_tar(&[("etc/motd", b"top")]);
        fx.serve_image("library/alpine", "3.18", &[base, top]).await;

        let image = fx.materialize("alpine:3.18").await.expect("materialize");

        let order: Vec<usize> = image.layers.iter().map(|l| l.index).collect();
        assert_eq!(order, vec![1, 0]);
        assert_eq!(image.reference.repository(), "library/alpine");
        assert_eq!(
            std::fs::read_to_string(fx.rootfs().join("etc/motd")).expect("read"),
            "top"
        );
        assert_eq!(
            std::fs::read_to_string(fx.rootfs().join("bin/sh")).expect("read"),
            "shell"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn staging_is_removed_after_success() {
        let fx = Fixture::start().await;
        fx.serve_image("myorg/app", "latest", &[layer_tar(&[("app", b"x")])])
            .await;

        let image = fx.materialize("myorg/app").await.expect("materialize");
        assert_eq!(image.layers.len(), 1);
        assert!(image.total_size() > 0);
        assert!(fx.staging_is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_blob_prevents_any_extraction() {
        let fx = Fixture::start().await;
        let good = layer_tar(&[("etc/motd", b"base")]);
        let good_digest = hash::sha256_digest(&good);
        let missing_digest = hash::sha256_digest(b"never served");
        Mock::given(method("GET"))
            .and(path(format!("/v2/library/alpine/blobs/{good_digest}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(good))
            .mount(&fx.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/library/alpine/manifests/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fsLayers": [
                    {"blobSum": good_digest.to_string()},
                    {"blobSum": missing_digest.to_string()}
                ]
            })))
            .mount(&fx.server)
            .await;

        let err = fx.materialize("alpine").await.unwrap_err();
        assert!(matches!(
            err,
            ImageError::BlobFetch {
                index: 1,
                source: RegistryFailure::Status { status: 404, .. },
                ..
            }
        ));
        assert!(!fx.rootfs().exists());
        assert!(fx.staging_is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_archive_reports_its_index_and_cleans_staging() {
        let fx = Fixture::start().await;
        let base = layer_tar(&[("etc/motd", b"base")]);
        let corrupt = vec![0x1f, 0x8b, 0x00, 0x00];
        fx.serve_image("library/alpine", "latest", &[base, corrupt])
            .await;

        let err = fx.materialize("alpine:latest").await.unwrap_err();
        assert!(matches!(err, ImageError::Extraction { index: 0, .. }));
        // The base layer was applied before the failure and stays.
        assert!(fx.rootfs().join("etc/motd").exists());
        assert!(fx.staging_is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_reference_fails_before_any_request() {
        let fx = Fixture::start().await;
        let err = fx.materialize("alpine:").await.unwrap_err();
        assert!(matches!(err, ImageError::InvalidReference { .. }));
        let requests = fx.server.received_requests().await.expect("recording");
        assert!(requests.is_empty());
    }
}
