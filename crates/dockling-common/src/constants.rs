//! System-wide constants and registry defaults.

/// Token endpoint used when no other is configured (Docker Hub).
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io/token";

/// `service` query parameter sent to the token endpoint.
pub const DEFAULT_AUTH_SERVICE: &str = "registry.docker.io";

/// Registry API base URL used when no other is configured (Docker Hub).
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Namespace assumed for references without a `/` (official images).
pub const DEFAULT_NAMESPACE: &str = "library";

/// Tag assumed for references without a `:`.
pub const DEFAULT_TAG: &str = "latest";

/// Operating system requested from multi-platform manifest lists.
pub const DEFAULT_OS: &str = "linux";

/// Prefix of the per-fetch layer staging directory.
pub const STAGING_PREFIX: &str = "dockling-blobs-";

/// Prefix of the temporary container root directory.
pub const ROOT_PREFIX: &str = "dockling-root-";

/// Exit status used when Dockling itself fails (as opposed to the child).
pub const FATAL_EXIT_CODE: i32 = 125;

/// Offset added to a signal number when a child is killed by a signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// `User-Agent` header sent to registries.
pub const USER_AGENT: &str = concat!("dockling/", env!("CARGO_PKG_VERSION"));

/// Application name used in diagnostics.
pub const APP_NAME: &str = "dockling";

/// Maximum number of layers accepted in a single manifest.
pub const MAX_IMAGE_LAYERS: usize = 128;
