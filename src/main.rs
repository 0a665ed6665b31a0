use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use hc_install::config::{InstallConfig, config_path};
use hc_install::releases::EnterpriseOptions;
use hc_install::source::Installable;
use hc_install::source::releases::{ExactVersion, LatestVersion, ReleaseOptions};
use hc_install::version::VersionRequest;
use hc_install::version::semver::parse_version;
use hc_install::{Installer, Product};

#[derive(Parser)]
#[command(name = "hc-install")]
#[command(version, about = "Install a version-matched product binary from the release catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download, verify, and unpack a release
    Install(InstallArgs),
}

#[derive(Args)]
struct InstallArgs {
    /// Product name, e.g. terraform
    product: String,

    /// Exact version to install
    #[arg(long, conflicts_with = "constraint")]
    version: Option<String>,

    /// Constraint expression, e.g. "~> 1.5"; newest release when omitted
    #[arg(long)]
    constraint: Option<String>,

    /// Install into this directory instead of a temporary one
    #[arg(long)]
    path: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// ASCII-armored public key used to verify checksum signatures
    #[arg(long)]
    public_key_file: Option<PathBuf>,

    /// Release catalog mirror
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    skip_checksum_verification: bool,

    #[arg(long)]
    include_prereleases: bool,

    /// Install the enterprise edition, copying license files here
    #[arg(long)]
    license_dir: Option<PathBuf>,

    /// Enterprise build metadata such as "hsm" or "fips1402"
    #[arg(long, requires = "license_dir")]
    enterprise_meta: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Install(args) => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(install(args)),
    }
}

async fn install(args: InstallArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (dispatch, _guard) = hc_install::logging::dispatch(args.log_file.as_deref())
        .context("failed to set up logging")?;

    let product = Product::lookup(&args.product).unwrap_or_else(|| Product::new(&args.product));
    let options = release_options(&args, &config)?;
    let include_prereleases = args.include_prereleases || config.include_prereleases;

    let source: Box<dyn Installable> = match (&args.version, &args.constraint) {
        (Some(version), _) => {
            let version = parse_version(version)
                .with_context(|| format!("invalid version {:?}", version))?;
            Box::new(ExactVersion {
                options,
                ..ExactVersion::new(product, version)
            })
        }
        (None, constraint) => {
            let request = match constraint {
                Some(c) => c
                    .parse::<VersionRequest>()
                    .with_context(|| format!("invalid constraint {:?}", c))?,
                None => VersionRequest::Latest,
            };
            Box::new(LatestVersion {
                request,
                include_prereleases,
                options,
                ..LatestVersion::new(product)
            })
        }
    };

    let mut installer = Installer::new();
    installer.set_logger(dispatch);
    let details = installer.install(vec![source]).await?;

    println!("{}", details.executable_path.display());
    if let Some(version) = &details.version {
        println!("{}", version);
    }
    Ok(())
}

/// Read an explicit config file, or the default one when it exists
fn load_config(explicit: Option<&Path>) -> anyhow::Result<InstallConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(InstallConfig::default());
            }
            path
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

fn release_options(args: &InstallArgs, config: &InstallConfig) -> anyhow::Result<ReleaseOptions> {
    let mut options = ReleaseOptions::from_config(config);
    options.install_dir = args.path.clone();
    options.skip_checksum_verification |= args.skip_checksum_verification;

    if let Some(path) = &args.public_key_file {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read public key {}", path.display()))?;
        options.armored_public_key = Some(key);
    }
    if let Some(url) = &args.base_url {
        options.api_base_url = Some(url.clone());
    }
    if let Some(dir) = &args.license_dir {
        let mut enterprise = EnterpriseOptions::new(dir);
        enterprise.meta = args.enterprise_meta.clone();
        options.enterprise = Some(enterprise);
    }

    Ok(options)
}
