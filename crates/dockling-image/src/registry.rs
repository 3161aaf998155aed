//! Registry HTTP client.
//!
//! Speaks the subset of the registry v2 protocol needed to pull an image:
//! an anonymous pull token, the manifest, and the layer blobs. Every call is
//! a single blocking attempt; nothing is retried.

use std::fmt;

use dockling_common::config::{DocklingConfig, RegistryConfig};
use dockling_common::constants::USER_AGENT;
use dockling_common::types::Platform;
use reqwest::blocking::{Client, RequestBuilder, Response};

use crate::error::{ImageError, ImageResult, RegistryFailure};
use crate::hash;
use crate::manifest::{self, LayerDigest, Manifest, ManifestDocument};

/// Bearer token granting pull access to one repository.
///
/// Short-lived and never persisted. Its `Debug` output does not reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Blocking client for one registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    config: RegistryConfig,
    platform: Platform,
}

impl RegistryClient {
    /// Builds a client for the registry described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Client`] if the HTTP client cannot be built
    /// (for example when no TLS backend is available).
    pub fn new(config: &DocklingConfig) -> ImageResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.registry.request_timeout())
            .build()
            .map_err(|source| ImageError::Client { source })?;
        Ok(Self {
            http,
            config: config.registry.clone(),
            platform: config.platform.clone(),
        })
    }

    /// Obtains an anonymous pull token for `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Auth`] if the request fails, the body is not a
    /// JSON object, or it carries no string `token` (nor `access_token`).
    pub fn fetch_token(&self, repository: &str) -> ImageResult<AuthToken> {
        let auth_error = |source| ImageError::Auth {
            repository: repository.to_string(),
            source,
        };

        let scope = format!("repository:{repository}:pull");
        let request = self.http.get(&self.config.auth_url).query(&[
            ("service", self.config.auth_service.as_str()),
            ("scope", scope.as_str()),
        ]);
        tracing::debug!(url = %self.config.auth_url, %scope, "requesting pull token");

        let body = read_body(request, &self.config.auth_url).map_err(auth_error)?;
        let object = manifest::decode_object(&body, "token response").map_err(auth_error)?;

        // Some registries only send the OAuth2 spelling.
        let field = if !object.contains_key("token") && object.contains_key("access_token") {
            "access_token"
        } else {
            "token"
        };
        let token: String = manifest::field(&object, field).map_err(auth_error)?;

        tracing::info!(repository, "obtained pull token");
        Ok(AuthToken(token))
    }

    /// Fetches the manifest of `repository` at `reference` (tag or digest).
    ///
    /// A manifest list is resolved to the entry for the configured platform,
    /// which is then fetched by digest.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Manifest`] on network failure, non-success
    /// status, a body that does not decode, no entry for the platform, or a
    /// manifest list nested in another.
    pub fn fetch_manifest(
        &self,
        repository: &str,
        reference: &str,
        token: &AuthToken,
    ) -> ImageResult<Manifest> {
        let manifest_error = |source: RegistryFailure| ImageError::Manifest {
            repository: repository.to_string(),
            reference: reference.to_string(),
            source,
        };

        let manifest = match self
            .get_manifest(repository, reference, token)
            .map_err(manifest_error)?
        {
            ManifestDocument::Image(manifest) => manifest,
            ManifestDocument::Index(entries) => {
                let entry =
                    manifest::select_platform(&entries, &self.platform).map_err(manifest_error)?;
                tracing::debug!(
                    platform = %self.platform,
                    digest = %entry.digest,
                    "resolved manifest list entry"
                );
                match self
                    .get_manifest(repository, entry.digest.as_str(), token)
                    .map_err(manifest_error)?
                {
                    ManifestDocument::Image(manifest) => manifest,
                    ManifestDocument::Index(_) => {
                        return Err(manifest_error(RegistryFailure::NestedIndex {
                            digest: entry.digest.to_string(),
                        }));
                    }
                }
            }
        };

        tracing::info!(
            repository,
            reference,
            layers = manifest.len(),
            format = ?manifest.format,
            "fetched manifest"
        );
        Ok(manifest)
    }

    /// Downloads the blob `digest` of `repository` and verifies its content.
    ///
    /// The caller attaches the layer index when turning a failure into an
    /// [`ImageError::BlobFetch`].
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryFailure`] on network failure, non-success status,
    /// or when the bytes do not hash to `digest`.
    pub fn fetch_blob(
        &self,
        repository: &str,
        digest: &LayerDigest,
        token: &AuthToken,
    ) -> Result<Vec<u8>, RegistryFailure> {
        let url = format!(
            "{}/v2/{repository}/blobs/{digest}",
            self.config.registry_base()
        );
        tracing::debug!(%url, "fetching blob");

        let request = self.http.get(&url).bearer_auth(token.as_str());
        let bytes = read_body(request, &url)?;
        hash::verify_digest(digest, &bytes)?;

        tracing::debug!(%digest, size = bytes.len(), "fetched blob");
        Ok(bytes)
    }

    fn get_manifest(
        &self,
        repository: &str,
        reference: &str,
        token: &AuthToken,
    ) -> Result<ManifestDocument, RegistryFailure> {
        let url = format!(
            "{}/v2/{repository}/manifests/{reference}",
            self.config.registry_base()
        );
        tracing::debug!(%url, "fetching manifest");

        let request = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .header(reqwest::header::ACCEPT, manifest::accept_header());
        let body = read_body(request, &url)?;
        ManifestDocument::decode(&body)
    }
}

/// Sends `request` and returns the body of a successful response.
fn read_body(request: RequestBuilder, url: &str) -> Result<Vec<u8>, RegistryFailure> {
    let transport = |source| RegistryFailure::Transport {
        url: url.to_string(),
        source,
    };
    let response: Response = request.send().map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(RegistryFailure::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.bytes().map(|b| b.to_vec()).map_err(transport)
}
