//! Registry manifest decoding.
//!
//! Registries answer a manifest request with one of several documents:
//! a schema 1 manifest (`fsLayers`), a schema 2 / OCI image manifest
//! (`layers`), or a manifest list / OCI index (`manifests`) that points at
//! one image manifest per platform. Decoding is strict: every field that is
//! read must be present and well formed, and failures name the field.
//!
//! Whatever the source document, [`Manifest::layers`] is ordered top-first:
//! index 0 is the most recently added layer, the last index is the base.

use std::fmt;

use dockling_common::constants::MAX_IMAGE_LAYERS;
use dockling_common::types::Platform;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::RegistryFailure;

/// Docker schema 2 image manifest.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Docker schema 2 manifest list.
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
/// Docker schema 1 signed manifest.
pub const DOCKER_MANIFEST_V1_SIGNED: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
/// OCI image manifest.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// OCI image index.
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Value of the `Accept` header sent with manifest requests, most preferred first.
#[must_use]
pub fn accept_header() -> String {
    [
        DOCKER_MANIFEST_V2,
        OCI_MANIFEST,
        DOCKER_MANIFEST_LIST,
        OCI_INDEX,
        DOCKER_MANIFEST_V1_SIGNED,
    ]
    .join(", ")
}

/// Content-addressed identifier of a blob, `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerDigest(String);

impl LayerDigest {
    /// Validates and wraps a digest string.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFailure::InvalidDigest`] unless the value has a
    /// non-empty algorithm and a non-empty hex part separated by `:`.
    pub fn parse(value: impl Into<String>) -> Result<Self, RegistryFailure> {
        let value = value.into();
        match value.split_once(':') {
            Some((alg, hex))
                if !alg.is_empty()
                    && !hex.is_empty()
                    && hex.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                Ok(Self(value))
            }
            _ => Err(RegistryFailure::InvalidDigest { value }),
        }
    }

    /// Wraps a digest this crate computed itself.
    pub(crate) const fn from_computed(value: String) -> Self {
        Self(value)
    }

    /// Returns the algorithm part (e.g. `sha256`).
    #[must_use]
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map_or("", |(alg, _)| alg)
    }

    /// Returns the hex-encoded hash part.
    #[must_use]
    pub fn hex(&self) -> &str {
        self.0.split_once(':').map_or("", |(_, hex)| hex)
    }

    /// Returns the full `algorithm:hex` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which registry schema a manifest was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// Docker schema 1 (`fsLayers[].blobSum`, top-first).
    SchemaV1,
    /// Docker schema 2 or OCI (`layers[].digest`, base-first).
    SchemaV2,
}

/// An image manifest reduced to its ordered layer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Layer digests, topmost first.
    pub layers: Vec<LayerDigest>,
    /// Schema the manifest was decoded from.
    pub format: ManifestFormat,
}

/// One platform-specific entry of a manifest list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformManifest {
    /// Digest of the image manifest for this platform.
    pub digest: LayerDigest,
    /// Platform the entry targets, when the registry states one.
    pub platform: Option<Platform>,
}

/// A decoded manifest response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestDocument {
    /// A single image manifest.
    Image(Manifest),
    /// A manifest list / OCI index.
    Index(Vec<PlatformManifest>),
}

impl ManifestDocument {
    /// Decodes a manifest response body.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFailure::MalformedBody`] if the body is not JSON,
    /// [`RegistryFailure::MissingField`] / [`RegistryFailure::InvalidField`]
    /// naming the offending field, [`RegistryFailure::InvalidDigest`] for a
    /// malformed digest, or [`RegistryFailure::TooManyLayers`].
    pub fn decode(body: &[u8]) -> Result<Self, RegistryFailure> {
        let object = decode_object(body, "manifest")?;

        if object.contains_key("fsLayers") {
            let layers: Vec<V1Layer> = field(&object, "fsLayers")?;
            let digests = layers
                .into_iter()
                .map(|l| LayerDigest::parse(l.blob_sum))
                .collect::<Result<Vec<_>, _>>()?;
            return Manifest::new(digests, ManifestFormat::SchemaV1).map(Self::Image);
        }

        if object.contains_key("manifests") {
            let entries: Vec<IndexEntry> = field(&object, "manifests")?;
            return entries
                .into_iter()
                .map(|entry| -> Result<PlatformManifest, RegistryFailure> {
                    Ok(PlatformManifest {
                        digest: LayerDigest::parse(entry.digest)?,
                        platform: entry
                            .platform
                            .map(|p| Platform {
                                os: p.os,
                                architecture: p.architecture,
                                variant: p.variant,
                            }),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Index);
        }

        let layers: Vec<Descriptor> = field(&object, "layers")?;
        let mut digests = layers
            .into_iter()
            .map(|d| LayerDigest::parse(d.digest))
            .collect::<Result<Vec<_>, _>>()?;
        // Schema 2 lists the base layer first.
        digests.reverse();
        Manifest::new(digests, ManifestFormat::SchemaV2).map(Self::Image)
    }
}

impl Manifest {
    fn new(layers: Vec<LayerDigest>, format: ManifestFormat) -> Result<Self, RegistryFailure> {
        if layers.len() > MAX_IMAGE_LAYERS {
            return Err(RegistryFailure::TooManyLayers {
                count: layers.len(),
                limit: MAX_IMAGE_LAYERS,
            });
        }
        Ok(Self { layers, format })
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns whether the manifest has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Picks the manifest matching `platform` out of a manifest list.
///
/// The first entry accepted by [`Platform::accepts`] wins, so without a
/// configured variant the registry's order decides between variants.
///
/// # Errors
///
/// Returns [`RegistryFailure::NoMatchingPlatform`] if no entry matches.
pub fn select_platform<'a>(
    entries: &'a [PlatformManifest],
    platform: &Platform,
) -> Result<&'a PlatformManifest, RegistryFailure> {
    entries
        .iter()
        .find(|entry| entry.platform.as_ref().is_some_and(|p| platform.accepts(p)))
        .ok_or_else(|| RegistryFailure::NoMatchingPlatform {
            platform: platform.to_string(),
        })
}

#[derive(Deserialize)]
struct V1Layer {
    #[serde(rename = "blobSum")]
    blob_sum: String,
}

#[derive(Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Deserialize)]
struct IndexEntry {
    digest: String,
    #[serde(default)]
    platform: Option<EntryPlatform>,
}

#[derive(Deserialize)]
struct EntryPlatform {
    os: String,
    architecture: String,
    #[serde(default)]
    variant: Option<String>,
}

/// Parses a response body that must be a JSON object.
///
/// `document` names the object in the error when the body is JSON of
/// another kind.
pub(crate) fn decode_object(
    body: &[u8],
    document: &'static str,
) -> Result<Map<String, Value>, RegistryFailure> {
    let value: Value =
        serde_json::from_slice(body).map_err(|source| RegistryFailure::MalformedBody { source })?;
    serde_json::from_value(value).map_err(|source| RegistryFailure::InvalidField {
        field: document,
        source,
    })
}

/// Reads one required field out of a JSON object, naming it on failure.
pub(crate) fn field<T: DeserializeOwned>(
    object: &Map<String, Value>,
    name: &'static str,
) -> Result<T, RegistryFailure> {
    let value = object
        .get(name)
        .ok_or(RegistryFailure::MissingField { field: name })?;
    T::deserialize(value).map_err(|source| RegistryFailure::InvalidField {
        field: name,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "sha256:aaaa";
    const B: &str = "sha256:bbbb";
    const C: &str = "sha256:cccc";

    fn digests(m: &Manifest) -> Vec<&str> {
        m.layers.iter().map(LayerDigest::as_str).collect()
    }

    fn image(doc: ManifestDocument) -> Manifest {
        match doc {
            ManifestDocument::Image(m) => m,
            ManifestDocument::Index(_) => unreachable!("expected an image manifest"),
        }
    }

    #[test]
    fn schema_v1_keeps_top_first_order() {
        let body = format!(
            r#"{{"schemaVersion":1,"fsLayers":[{{"blobSum":"{A}"}},{{"blobSum":"{B}"}}]}}"#
        );
        let m = image(ManifestDocument::decode(body.as_bytes()).unwrap());
        assert_eq!(m.format, ManifestFormat::SchemaV1);
        assert_eq!(digests(&m), vec![A, B]);
    }

    #[test]
    fn schema_v2_is_reversed_to_top_first() {
        let body = format!(
            r#"{{"schemaVersion":2,"mediaType":"{DOCKER_MANIFEST_V2}",
                "config":{{"digest":"sha256:ffff"}},
                "layers":[{{"digest":"{A}","size":1}},{{"digest":"{B}","size":2}},{{"digest":"{C}","size":3}}]}}"#
        );
        let m = image(ManifestDocument::decode(body.as_bytes()).unwrap());
        assert_eq!(m.format, ManifestFormat::SchemaV2);
        assert_eq!(digests(&m), vec![C, B, A]);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn manifest_list_yields_platform_entries() {
        let body = format!(
            r#"{{"manifests":[
                {{"digest":"{A}","platform":{{"os":"linux","architecture":"amd64"}}}},
                {{"digest":"{B}","platform":{{"os":"linux","architecture":"arm64","variant":"v8"}}}},
                {{"digest":"{C}"}}]}}"#
        );
        let ManifestDocument::Index(entries) = ManifestDocument::decode(body.as_bytes()).unwrap()
        else {
            unreachable!("expected an index");
        };
        assert_eq!(entries.len(), 3);
        let arm = select_platform(&entries, &Platform::new("linux", "arm64")).unwrap();
        assert_eq!(arm.digest.as_str(), B);
        assert!(matches!(
            select_platform(&entries, &Platform::new("linux", "s390x")),
            Err(RegistryFailure::NoMatchingPlatform { .. })
        ));
    }

    #[test]
    fn configured_variant_selects_among_arm_entries() {
        let body = format!(
            r#"{{"manifests":[
                {{"digest":"{A}","platform":{{"os":"linux","architecture":"arm","variant":"v6"}}}},
                {{"digest":"{B}","platform":{{"os":"linux","architecture":"arm","variant":"v7"}}}}]}}"#
        );
        let ManifestDocument::Index(entries) = ManifestDocument::decode(body.as_bytes()).unwrap()
        else {
            unreachable!("expected an index");
        };

        let v7 = Platform::new("linux", "arm").with_variant("v7");
        assert_eq!(select_platform(&entries, &v7).unwrap().digest.as_str(), B);
        let any_arm = Platform::new("linux", "arm");
        assert_eq!(select_platform(&entries, &any_arm).unwrap().digest.as_str(), A);
        let v8 = Platform::new("linux", "arm").with_variant("v8");
        assert!(select_platform(&entries, &v8).is_err());
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            ManifestDocument::decode(b"<html>"),
            Err(RegistryFailure::MalformedBody { .. })
        ));
    }

    #[test]
    fn missing_layer_list_names_the_field() {
        let err = ManifestDocument::decode(br#"{"schemaVersion":2}"#).unwrap_err();
        assert!(matches!(err, RegistryFailure::MissingField { field: "layers" }));
    }

    #[test]
    fn wrongly_typed_layer_list_names_the_field() {
        let err = ManifestDocument::decode(br#"{"layers":"nope"}"#).unwrap_err();
        assert!(matches!(err, RegistryFailure::InvalidField { field: "layers", .. }));

        let err = ManifestDocument::decode(br#"{"fsLayers":[{"blobSum":7}]}"#).unwrap_err();
        assert!(matches!(err, RegistryFailure::InvalidField { field: "fsLayers", .. }));
    }

    #[test]
    fn top_level_array_is_rejected() {
        let err = ManifestDocument::decode(b"[]").unwrap_err();
        assert!(matches!(err, RegistryFailure::InvalidField { field: "manifest", .. }));
    }

    #[test]
    fn malformed_digest_is_rejected() {
        let err = ManifestDocument::decode(br#"{"layers":[{"digest":"not-a-digest"}]}"#).unwrap_err();
        assert!(matches!(err, RegistryFailure::InvalidDigest { .. }));
    }

    #[test]
    fn layer_limit_is_enforced() {
        let layers = (0..=MAX_IMAGE_LAYERS)
            .map(|i| format!(r#"{{"digest":"sha256:{i:04x}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        let body = format!(r#"{{"layers":[{layers}]}}"#);
        assert!(matches!(
            ManifestDocument::decode(body.as_bytes()),
            Err(RegistryFailure::TooManyLayers { .. })
        ));
    }

    #[test]
    fn digest_parts_are_exposed() {
        let d = LayerDigest::parse("sha256:00ff").unwrap();
        assert_eq!(d.algorithm(), "sha256");
        assert_eq!(d.hex(), "00ff");
        assert_eq!(d.to_string(), "sha256:00ff");
    }

    #[test]
    fn accept_header_prefers_schema_v2() {
        assert!(accept_header().starts_with(DOCKER_MANIFEST_V2));
        assert!(accept_header().contains(OCI_INDEX));
    }
}
