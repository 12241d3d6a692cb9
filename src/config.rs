use crate::{
    errors::ConfigError,
    services::{classifier::Naming, storage_sink::RemoteEndpoint, validator},
};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::{env, path::PathBuf};

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Upload target bucket; no upload happens without one.
    pub remote_bucket: Option<String>,
    pub remote_prefix: String,
    pub endpoint: RemoteEndpoint,
    pub naming: Naming,
    pub required_textures: usize,
    pub ledger_url: Option<String>,
    pub log_file: Option<PathBuf>,
    pub no_upload: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Group loose 3D asset files into validated, packaged product folders"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory holding the raw asset files (overrides ASSET_ORGANIZER_SOURCE_DIR)
    #[arg(long, global = true)]
    pub source_dir: Option<PathBuf>,

    /// Directory receiving product folders (overrides ASSET_ORGANIZER_OUTPUT_DIR)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Bucket to upload products into (overrides ASSET_ORGANIZER_BUCKET)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Key prefix inside the bucket (overrides ASSET_ORGANIZER_PREFIX)
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Object store URL or local mirror directory (overrides ASSET_ORGANIZER_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Product identifier naming convention (overrides ASSET_ORGANIZER_NAMING)
    #[arg(long, global = true, value_enum)]
    pub naming: Option<Naming>,

    /// Textures a complete product ships with
    #[arg(long, global = true)]
    pub required_textures: Option<usize>,

    /// SQLite URL of the run ledger (overrides ASSET_ORGANIZER_LEDGER_URL)
    #[arg(long, global = true)]
    pub ledger_url: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Package only, even when a bucket is configured
    #[arg(long, global = true)]
    pub no_upload: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Group, validate, package and upload products (default)
    Organize,
    /// Delete the output directory
    Clean {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Show recent runs recorded in the ledger
    History {
        /// Number of runs to show
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Write a sample raw-asset set into the source directory
    SampleData {
        /// Product identifiers to generate
        #[arg(long, num_args = 1.., default_values_t = default_sample_products())]
        products: Vec<String>,
    },
}

fn default_sample_products() -> Vec<String> {
    vec!["PROD001".into(), "PROD002".into(), "PROD003".into()]
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        let (cfg, command) = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, command))
    }

    /// Merge parsed arguments with environment lookups: CLI first, then
    /// environment, then defaults.
    pub fn resolve(
        args: Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Command), ConfigError> {
        let env_source = env("ASSET_ORGANIZER_SOURCE_DIR").unwrap_or_else(|| "./raw_assets".into());
        let env_output =
            env("ASSET_ORGANIZER_OUTPUT_DIR").unwrap_or_else(|| "./organized_products".into());
        let env_prefix = env("ASSET_ORGANIZER_PREFIX").unwrap_or_else(|| "products".into());
        let env_endpoint =
            env("ASSET_ORGANIZER_ENDPOINT").unwrap_or_else(|| "http://127.0.0.1:3000".into());
        let env_naming = match env("ASSET_ORGANIZER_NAMING") {
            Some(value) => {
                Naming::from_str(&value, true).map_err(|reason| ConfigError::InvalidValue {
                    var: "ASSET_ORGANIZER_NAMING",
                    value,
                    reason,
                })?
            }
            None => Naming::default(),
        };

        let remote_bucket = args
            .bucket
            .or_else(|| env("ASSET_ORGANIZER_BUCKET"))
            .filter(|b| !b.is_empty());
        if let Some(bucket) = &remote_bucket {
            ensure_bucket_name_safe(bucket)?;
        }

        let cfg = Self {
            source_dir: args.source_dir.unwrap_or_else(|| env_source.into()),
            output_dir: args.output_dir.unwrap_or_else(|| env_output.into()),
            remote_bucket,
            remote_prefix: args.prefix.unwrap_or(env_prefix),
            endpoint: RemoteEndpoint::parse(&args.endpoint.unwrap_or(env_endpoint))?,
            naming: args.naming.unwrap_or(env_naming),
            required_textures: args
                .required_textures
                .unwrap_or(validator::DEFAULT_REQUIRED_TEXTURES),
            ledger_url: args
                .ledger_url
                .or_else(|| env("ASSET_ORGANIZER_LEDGER_URL"))
                .filter(|u| !u.is_empty()),
            log_file: args.log_file,
            no_upload: args.no_upload,
        };

        Ok((cfg, args.command.unwrap_or(Command::Organize)))
    }

    /// Bucket to upload into, when uploads are enabled.
    pub fn upload_bucket(&self) -> Option<&str> {
        if self.no_upload {
            return None;
        }
        self.remote_bucket.as_deref()
    }
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn ensure_bucket_name_safe(name: &str) -> Result<(), ConfigError> {
    if name.trim() != name {
        return Err(ConfigError::bucket(name, "cannot begin or end with whitespace"));
    }

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(ConfigError::bucket(
            name,
            "must be between 3 and 63 characters",
        ));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(ConfigError::bucket(
            name,
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(ConfigError::bucket(
            name,
            "must start and end with a lowercase letter or digit",
        ));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(ConfigError::bucket(
            name,
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(ConfigError::bucket(
            name,
            "must not be formatted like an IP address",
        ));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(argv: &[&str], vars: &[(&str, &str)]) -> Result<(AppConfig, Command), ConfigError> {
        let args = Args::try_parse_from(std::iter::once("asset-organizer").chain(argv.iter().copied()))
            .unwrap();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::resolve(args, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_args_or_env() {
        let (cfg, command) = resolve(&[], &[]).unwrap();
        assert_eq!(command, Command::Organize);
        assert_eq!(cfg.source_dir, PathBuf::from("./raw_assets"));
        assert_eq!(cfg.output_dir, PathBuf::from("./organized_products"));
        assert_eq!(cfg.remote_prefix, "products");
        assert_eq!(cfg.remote_bucket, None);
        assert_eq!(cfg.naming, Naming::Default);
        assert_eq!(cfg.required_textures, 3);
        assert!(matches!(cfg.endpoint, RemoteEndpoint::Http(_)));
        assert_eq!(cfg.upload_bucket(), None);
    }

    #[test]
    fn cli_overrides_environment() {
        let (cfg, _) = resolve(
            &["--bucket", "cli-bucket", "--source-dir", "/in"],
            &[
                ("ASSET_ORGANIZER_BUCKET", "env-bucket"),
                ("ASSET_ORGANIZER_SOURCE_DIR", "/env-in"),
                ("ASSET_ORGANIZER_PREFIX", "assets/3d"),
                ("ASSET_ORGANIZER_NAMING", "first-segment"),
            ],
        )
        .unwrap();
        assert_eq!(cfg.remote_bucket.as_deref(), Some("cli-bucket"));
        assert_eq!(cfg.source_dir, PathBuf::from("/in"));
        assert_eq!(cfg.remote_prefix, "assets/3d");
        assert_eq!(cfg.naming, Naming::FirstSegment);
        assert_eq!(cfg.upload_bucket(), Some("cli-bucket"));
    }

    #[test]
    fn no_upload_disables_configured_bucket() {
        let (cfg, _) = resolve(&["--bucket", "my-products", "--no-upload"], &[]).unwrap();
        assert_eq!(cfg.upload_bucket(), None);
    }

    #[test]
    fn subcommands_parse() {
        let (_, command) = resolve(&["clean", "--yes"], &[]).unwrap();
        assert_eq!(command, Command::Clean { yes: true });

        let (_, command) = resolve(&["history", "--limit", "2"], &[]).unwrap();
        assert_eq!(command, Command::History { limit: 2 });

        let (_, command) = resolve(&["sample-data"], &[]).unwrap();
        assert_eq!(
            command,
            Command::SampleData {
                products: default_sample_products()
            }
        );

        let (cfg, command) =
            resolve(&["sample-data", "--products", "A1", "B2", "--source-dir", "/x"], &[])
                .unwrap();
        assert_eq!(
            command,
            Command::SampleData {
                products: vec!["A1".into(), "B2".into()]
            }
        );
        assert_eq!(cfg.source_dir, PathBuf::from("/x"));
    }

    #[test]
    fn rejects_bad_bucket_names() {
        for bad in [
            "ab",
            "Upper",
            "-lead",
            "trail.",
            "a..b",
            "a.-b",
            "192.168.0.1",
            " padded",
        ] {
            assert!(ensure_bucket_name_safe(bad).is_err(), "{bad}");
        }
        for good in ["products", "my-assets.v2", "abc", "1.2.3"] {
            assert!(ensure_bucket_name_safe(good).is_ok(), "{good}");
        }
        assert!(matches!(
            resolve(&["--bucket", "Bad_Bucket"], &[]),
            Err(ConfigError::InvalidBucketName { .. })
        ));
    }

    #[test]
    fn rejects_bad_naming_and_endpoint_env() {
        assert!(matches!(
            resolve(&[], &[("ASSET_ORGANIZER_NAMING", "camel")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            resolve(&[], &[("ASSET_ORGANIZER_ENDPOINT", "ftp://host")]),
            Err(ConfigError::Endpoint(_))
        ));
    }
}
