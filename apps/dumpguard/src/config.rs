//! Configuration: command-line flags with environment fallbacks
//!
//! A `.env` file is loaded by `main` before parsing, so every flag can also
//! come from there.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use dumpguard_domain::{BucketName, DiskLimit, GuardError, DEFAULT_TICK_INTERVAL};
use dumpguard_s3::S3Settings;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a dump producer and keep its output directory under a disk-usage limit"
)]
pub struct Args {
    /// Dump destination directory; must not exist yet
    #[arg(short = 'o', long = "output", env = "DUMPGUARD_OUTPUT", default_value = "dump")]
    pub output: PathBuf,

    /// Producer arguments separated by '|'; `-o <output>` is appended
    #[arg(
        short = 'a',
        long = "args",
        env = "DUMPGUARD_ARGS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub args: String,

    /// Disk usage limit in bytes before the directory is drained
    #[arg(short = 'l', long = "limit", env = "DUMPGUARD_LIMIT", default_value_t = 0)]
    pub limit: u64,

    /// Producer executable
    #[arg(long, env = "DUMPGUARD_PRODUCER", default_value = "mydumper")]
    pub producer: String,

    /// S3 endpoint URL (e.g. a MinIO server)
    #[arg(long, env = "DUMPGUARD_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 region (falls back to the AWS environment)
    #[arg(long, env = "DUMPGUARD_S3_REGION")]
    pub region: Option<String>,

    /// Use path-style bucket addressing
    #[arg(
        long,
        env = "DUMPGUARD_S3_FORCE_PATH_STYLE",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub force_path_style: bool,

    /// Suffix of the bucket created for this run
    #[arg(long, env = "DUMPGUARD_BUCKET_SUFFIX", default_value = "mydumper")]
    pub bucket_suffix: String,

    /// Log output format
    #[arg(long, env = "DUMPGUARD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output: PathBuf,
    pub producer: String,
    pub producer_args: Vec<String>,
    pub limit: DiskLimit,
    pub s3: S3Settings,
    pub bucket_suffix: String,
    pub tick_interval: Duration,
}

impl TryFrom<Args> for AppConfig {
    type Error = GuardError;

    /// Reject bad configuration before anything is created or launched
    fn try_from(args: Args) -> Result<Self, GuardError> {
        let limit = DiskLimit::new(args.limit)
            .map_err(|_| GuardError::config("please set a non-zero limit with -l"))?;

        match std::fs::symlink_metadata(&args.output) {
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Ok(_) => {
                return Err(GuardError::config(format!(
                    "output directory {} already exists",
                    args.output.display()
                )))
            }
            Err(err) => {
                return Err(GuardError::config(format!(
                    "cannot check output directory {}: {}",
                    args.output.display(),
                    err
                )))
            }
        }

        // Fail now rather than after the producer is running
        BucketName::timestamped(&args.bucket_suffix)?;

        Ok(Self {
            producer_args: producer_args(&args.output, &args.args),
            output: args.output,
            producer: args.producer,
            limit,
            s3: S3Settings {
                endpoint: args.endpoint,
                region: args.region,
                force_path_style: args.force_path_style,
            },
            bucket_suffix: args.bucket_suffix,
            tick_interval: DEFAULT_TICK_INTERVAL,
        })
    }
}

/// Split `other` on '|' and append `-o <dst>`
pub fn producer_args(dst: &Path, other: &str) -> Vec<String> {
    other
        .split('|')
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .chain(["-o".to_string(), dst.display().to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("dumpguard").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dump");
        let args = parse(&["-o", output.to_str().unwrap(), "-l", "0"]);

        let err = AppConfig::try_from(args).unwrap_err();

        assert!(matches!(err, GuardError::Config(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_existing_output_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let args = parse(&["-o", dir.path().to_str().unwrap(), "-l", "100"]);

        let err = AppConfig::try_from(args).unwrap_err();

        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_invalid_bucket_suffix_is_rejected() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dump");
        let args = parse(&[
            "-o",
            output.to_str().unwrap(),
            "-l",
            "100",
            "--bucket-suffix",
            "Not_Valid",
        ]);

        assert!(matches!(
            AppConfig::try_from(args).unwrap_err(),
            GuardError::Config(_)
        ));
    }

    #[test]
    fn test_valid_flags() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dump");
        let args = parse(&[
            "-o",
            output.to_str().unwrap(),
            "-a",
            "--host=db|--threads=4",
            "-l",
            "1048576",
            "--region",
            "eu-west-3",
            "--force-path-style",
            "false",
        ]);

        let config = AppConfig::try_from(args).unwrap();

        assert_eq!(config.limit.bytes(), 1_048_576);
        assert_eq!(config.producer, "mydumper");
        assert_eq!(
            config.producer_args,
            vec![
                "--host=db".to_string(),
                "--threads=4".to_string(),
                "-o".to_string(),
                output.display().to_string(),
            ]
        );
        assert_eq!(config.s3.region.as_deref(), Some("eu-west-3"));
        assert!(!config.s3.force_path_style);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_producer_args_without_extra_args() {
        assert_eq!(
            producer_args(Path::new("dump"), ""),
            vec!["-o".to_string(), "dump".to_string()]
        );
    }

    #[test]
    fn test_producer_args_drop_empty_segments() {
        assert_eq!(
            producer_args(Path::new("out"), "-B|mydb||-v|3|"),
            vec!["-B", "mydb", "-v", "3", "-o", "out"]
        );
    }
}
