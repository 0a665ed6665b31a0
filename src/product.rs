//! Product descriptors and version discovery for installed binaries

#[cfg(test)]
use mockall::automock;

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use semver::Version;
use tokio::process::Command;
use tracing::debug;

use crate::build::{BuildInstructions, GoBuild, GoInstalled, run_command};
use crate::error::Error;
use crate::version::semver::parse_version;

/// Version pattern shared by products that print `<Name> v1.2.3`
const SIMPLE_VERSION_PATTERN: &str = r"v?(?P<version>[0-9]+(?:\.[0-9]+)*(?:-[A-Za-z0-9\.]+)?)";

/// Asks an installed binary which version it is
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionGetter: Send + Sync {
    async fn get_version(&self, exec_path: &Path) -> Result<Version, Error>;
}

/// Runs the binary with fixed arguments and extracts the `version` capture group
#[derive(Debug, Clone)]
pub struct CommandVersionGetter {
    args: Vec<String>,
    pattern: Regex,
}

impl CommandVersionGetter {
    /// Matches output such as `Terraform v1.5.7`
    pub fn for_name(display_name: &str) -> Self {
        Self::with_prefix(&format!("{} ", regex::escape(display_name)))
    }

    /// `prefix` is a regex placed in front of the version pattern
    ///
    /// Panics if `prefix` is not a valid regex.
    pub fn with_prefix(prefix: &str) -> Self {
        let pattern = Regex::new(&format!("{}{}", prefix, SIMPLE_VERSION_PATTERN))
            .expect("valid version output pattern");
        Self {
            args: vec!["version".to_string()],
            pattern,
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Extract the version from command output
    pub fn parse_output(&self, stdout: &str) -> Result<Version, String> {
        let stdout = stdout.trim();
        let raw = self
            .pattern
            .captures(stdout)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str())
            .ok_or_else(|| format!("no version found in output {:?}", stdout))?;

        parse_version(raw).ok_or_else(|| format!("unable to parse version {:?}", raw))
    }
}

#[async_trait::async_trait]
impl VersionGetter for CommandVersionGetter {
    async fn get_version(&self, exec_path: &Path) -> Result<Version, Error> {
        let query_err = |message: String| Error::VersionQuery {
            path: exec_path.to_path_buf(),
            message,
        };

        let mut cmd = Command::new(exec_path);
        cmd.args(&self.args);
        let output = run_command(cmd).await.map_err(|e| query_err(e.to_string()))?;
        if !output.status.success() {
            return Err(query_err(format!("exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = self.parse_output(&stdout).map_err(query_err)?;
        debug!("{} reports version {}", exec_path.display(), version);
        Ok(version)
    }
}

/// A product that can be found, installed from releases, or built
#[derive(Clone)]
pub struct Product {
    /// Catalog key, e.g. `terraform`
    pub name: String,
    /// Executable name without the platform suffix
    pub binary_stem: String,
    pub version_getter: Option<Arc<dyn VersionGetter>>,
    pub build_instructions: Option<BuildInstructions>,
}

impl Product {
    /// A product known only by name; its binary shares the name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            binary_stem: name.clone(),
            name,
            version_getter: None,
            build_instructions: None,
        }
    }

    pub fn with_version_getter(mut self, getter: Arc<dyn VersionGetter>) -> Self {
        self.version_getter = Some(getter);
        self
    }

    pub fn with_build_instructions(mut self, instructions: BuildInstructions) -> Self {
        self.build_instructions = Some(instructions);
        self
    }

    /// Executable filename on this platform (`terraform.exe` on Windows)
    pub fn binary_name(&self) -> String {
        format!("{}{}", self.binary_stem, std::env::consts::EXE_SUFFIX)
    }

    /// Well-known product by catalog name
    pub fn lookup(name: &str) -> Option<Product> {
        let product = match name {
            "terraform" => &*TERRAFORM,
            "consul" => &*CONSUL,
            "vault" => &*VAULT,
            "nomad" => &*NOMAD,
            "packer" => &*PACKER,
            "boundary" => &*BOUNDARY,
            _ => return None,
        };
        Some(product.clone())
    }
}

impl std::fmt::Debug for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Product")
            .field("name", &self.name)
            .field("binary_stem", &self.binary_stem)
            .field("version_getter", &self.version_getter.is_some())
            .field("build_instructions", &self.build_instructions)
            .finish()
    }
}

fn go_build(repo_url: &str) -> BuildInstructions {
    BuildInstructions::new(repo_url, Arc::new(GoBuild::default()))
        .with_pre_clone_check(Arc::new(GoInstalled))
}

fn simple(name: &str, display_name: &str) -> Product {
    Product::new(name).with_version_getter(Arc::new(CommandVersionGetter::for_name(display_name)))
}

pub static TERRAFORM: LazyLock<Product> = LazyLock::new(|| {
    simple("terraform", "Terraform")
        .with_build_instructions(go_build("https://github.com/hashicorp/terraform.git"))
});

pub static CONSUL: LazyLock<Product> = LazyLock::new(|| {
    simple("consul", "Consul")
        .with_build_instructions(go_build("https://github.com/hashicorp/consul.git"))
});

pub static VAULT: LazyLock<Product> = LazyLock::new(|| simple("vault", "Vault"));

pub static NOMAD: LazyLock<Product> = LazyLock::new(|| simple("nomad", "Nomad"));

pub static PACKER: LazyLock<Product> = LazyLock::new(|| simple("packer", "Packer"));

pub static BOUNDARY: LazyLock<Product> = LazyLock::new(|| {
    Product::new("boundary").with_version_getter(Arc::new(CommandVersionGetter::with_prefix(
        r"Version Number:\s+",
    )))
});
