//! `dockling run` — run a command inside a container image.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};
use dockling_common::config::{DocklingConfig, RegistryConfig};
use dockling_common::constants::{
    DEFAULT_AUTH_SERVICE, DEFAULT_AUTH_URL, DEFAULT_REGISTRY_URL, ROOT_PREFIX,
};
use dockling_common::types::Platform;
use dockling_image::ImageReference;
use dockling_runtime::{Population, RootPopulationStrategy};

/// Where the container root gets its contents from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// Pull the image from the registry.
    Remote,
    /// Copy the command's executable from the host; the image is not pulled.
    Local,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// How to populate the container root.
    #[arg(long, value_enum, env = "DOCKLING_SOURCE", default_value_t = Source::Remote)]
    pub source: Source,

    /// Token endpoint of the registry.
    #[arg(long, env = "DOCKLING_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// Service name sent with token requests.
    #[arg(long, env = "DOCKLING_AUTH_SERVICE", default_value = DEFAULT_AUTH_SERVICE)]
    pub auth_service: String,

    /// Base URL of the registry API.
    #[arg(long, env = "DOCKLING_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    /// Per-request timeout in seconds (none by default).
    #[arg(long, env = "DOCKLING_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Directory under which layer blobs are staged.
    #[arg(long, env = "DOCKLING_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Platform to select from multi-platform images, as `os/arch` or `os/arch/variant`.
    #[arg(long, env = "DOCKLING_PLATFORM")]
    pub platform: Option<Platform>,

    /// Image reference, e.g. `alpine:3.18` or `myorg/app`.
    pub image: String,

    /// Command to run inside the container.
    pub command: String,

    /// Arguments passed to the command verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    fn config(&self) -> DocklingConfig {
        DocklingConfig {
            registry: RegistryConfig {
                auth_url: self.auth_url.clone(),
                auth_service: self.auth_service.clone(),
                registry_url: self.registry_url.clone(),
                request_timeout_secs: self.request_timeout,
            },
            staging_dir: self.staging_dir.clone(),
            platform: self.platform.clone().unwrap_or_default(),
        }
    }

    fn strategy(&self) -> anyhow::Result<RootPopulationStrategy> {
        match self.source {
            Source::Remote => {
                // Reject a malformed reference before any directory is created.
                let reference = ImageReference::parse(&self.image)?;
                tracing::debug!(image = %reference, "pulling from registry");
                Ok(RootPopulationStrategy::FetchRemoteImage(self.image.clone()))
            }
            Source::Local => {
                tracing::debug!(image = %self.image, "local source, image is not pulled");
                Ok(RootPopulationStrategy::CopyLocalBinary(PathBuf::from(
                    &self.command,
                )))
            }
        }
    }
}

/// Executes the `run` command and returns the container command's exit code.
///
/// # Errors
///
/// Returns an error if the root cannot be created or populated, or if the
/// launch fails before the command exits.
pub fn execute(args: RunArgs) -> anyhow::Result<i32> {
    let config = args.config();
    let strategy = args.strategy()?;

    let root = tempfile::Builder::new()
        .prefix(ROOT_PREFIX)
        .tempdir()
        .context("failed to create container root")?;

    // Dropping `root` on error removes the partially populated directory.
    let population = strategy
        .populate(root.path(), &config)
        .with_context(|| format!("failed to populate container root for `{}`", args.image))?;
    match &population {
        Population::Image(image) => tracing::info!(
            image = %image.reference,
            layers = image.layers.len(),
            root = %root.path().display(),
            "container root ready"
        ),
        Population::Binary(path) => tracing::info!(
            binary = %path.display(),
            root = %root.path().display(),
            "container root ready"
        ),
    }

    // The process ends up jailed inside the root and cannot remove it.
    let root = root.keep();
    let code = dockling_runtime::launch(&root, &args.command, &args.args)
        .with_context(|| format!("failed to run `{}`", args.command))?;
    Ok(code)
}
