//! Image reference parsing.

use std::fmt;
use std::str::FromStr;

use dockling_common::constants::{DEFAULT_NAMESPACE, DEFAULT_TAG};

use crate::error::{ImageError, ImageResult};

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry namespace (`library` for official images).
    pub namespace: String,
    /// Image name within the namespace.
    pub name: String,
    /// Tag, or `algorithm:hex` digest for pinned references.
    pub tag: String,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Examples:
    /// - `alpine` -> library/alpine:latest
    /// - `alpine:3.18` -> library/alpine:3.18
    /// - `myorg/app:latest` -> myorg/app:latest
    /// - `alpine@sha256:ab12..` -> library/alpine pinned to that digest
    /// - `alpine:3.18@sha256:ab12..` -> same, the tag is dropped
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidReference`] for an empty reference,
    /// name, namespace, or tag, or a digest without an algorithm.
    pub fn parse(reference: &str) -> ImageResult<Self> {
        let trimmed = reference.trim();
        let invalid = |reason| ImageError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("reference is empty"));
        }

        let (name, tag) = if let Some((name, digest)) = trimmed.split_once('@') {
            if !digest.contains(':') {
                return Err(invalid("digest must be of the form <algorithm>:<hex>"));
            }
            // A tag next to a digest is ignored; the digest pins the image.
            let name = match name.rfind(':') {
                Some(idx) if !name[idx + 1..].contains('/') => &name[..idx],
                _ => name,
            };
            (name, digest)
        } else if let Some(idx) = trimmed.rfind(':') {
            let tail = &trimmed[idx + 1..];
            if tail.contains('/') {
                // The colon belongs to a host:port segment, not a tag.
                (trimmed, DEFAULT_TAG)
            } else if tail.is_empty() {
                return Err(invalid("tag is empty"));
            } else {
                (&trimmed[..idx], tail)
            }
        } else {
            (trimmed, DEFAULT_TAG)
        };

        if name.is_empty() {
            return Err(invalid("image name is empty"));
        }

        let (namespace, name) = match name.split_once('/') {
            Some((namespace, rest)) => {
                if namespace.is_empty() || rest.is_empty() {
                    return Err(invalid("empty path segment"));
                }
                (namespace, rest)
            }
            None => (DEFAULT_NAMESPACE, name),
        };

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Returns the repository path used in registry URLs (`namespace/name`).
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Returns whether the reference is pinned to a digest rather than a tag.
    #[must_use]
    pub fn is_digest(&self) -> bool {
        self.tag.contains(':')
    }
}

impl FromStr for ImageReference {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.is_digest() { '@' } else { ':' };
        write!(f, "{}{sep}{}", self.repository(), self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_image_gets_library_namespace() {
        let r = ImageReference::parse("alpine:3.18").unwrap();
        assert_eq!(r.repository(), "library/alpine");
        assert_eq!(r.tag, "3.18");
    }

    #[test]
    fn namespaced_image_keeps_its_namespace() {
        let r = ImageReference::parse("myorg/app:latest").unwrap();
        assert_eq!(r.namespace, "myorg");
        assert_eq!(r.repository(), "myorg/app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn missing_tag_defaults_to_latest() {
        let r = ImageReference::parse("ubuntu").unwrap();
        assert_eq!(r.repository(), "library/ubuntu");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn tag_is_taken_after_the_last_colon() {
        let r = ImageReference::parse("myorg/app:v1:rc").unwrap();
        assert_eq!(r.repository(), "myorg/app:v1");
        assert_eq!(r.tag, "rc");
    }

    #[test]
    fn nested_repository_path_is_preserved() {
        let r = ImageReference::parse("org/team/app:2").unwrap();
        assert_eq!(r.namespace, "org");
        assert_eq!(r.name, "team/app");
        assert_eq!(r.repository(), "org/team/app");
    }

    #[test]
    fn colon_before_a_slash_is_not_a_tag() {
        let r = ImageReference::parse("host:5000/app").unwrap();
        assert_eq!(r.repository(), "host:5000/app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn digest_reference_is_pinned() {
        let r = ImageReference::parse("alpine@sha256:abcd").unwrap();
        assert_eq!(r.repository(), "library/alpine");
        assert_eq!(r.tag, "sha256:abcd");
        assert!(r.is_digest());
        assert_eq!(r.to_string(), "library/alpine@sha256:abcd");
    }

    #[test]
    fn tag_beside_a_digest_is_dropped() {
        let r = ImageReference::parse("alpine:3.18@sha256:abcd").unwrap();
        assert_eq!(r.repository(), "library/alpine");
        assert_eq!(r.tag, "sha256:abcd");

        let r = ImageReference::parse("host:5000/app@sha256:abcd").unwrap();
        assert_eq!(r.repository(), "host:5000/app");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let r: ImageReference = "busybox:1.36".parse().unwrap();
        assert_eq!(r.to_string(), "library/busybox:1.36");
        assert_eq!(ImageReference::parse(&r.to_string()).unwrap(), r);
    }

    #[test]
    fn malformed_references_are_rejected() {
        for bad in ["", "   ", "alpine:", ":3.18", "/app", "org/", "alpine@abcd"] {
            assert!(
                matches!(
                    ImageReference::parse(bad),
                    Err(ImageError::InvalidReference { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
