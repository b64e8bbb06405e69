use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Folder name used when no output directory is configured.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "Procreate Recovered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampBackend {
    /// `filetime` plus `std::fs::FileTimes` where the platform allows setting birth time.
    #[default]
    Native,
    /// The macOS `SetFile` developer tool.
    SetFile,
}

impl FromStr for TimestampBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(TimestampBackend::Native),
            "setfile" => Ok(TimestampBackend::SetFile),
            other => Err(format!(
                "unknown timestamp backend '{}' (expected 'native' or 'setfile')",
                other
            )),
        }
    }
}

impl fmt::Display for TimestampBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampBackend::Native => write!(f, "native"),
            TimestampBackend::SetFile => write!(f, "setfile"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: Option<String>,
    pub jobs: usize,
    pub timestamp_backend: TimestampBackend,
    /// Globs matched against each entry's relative path and file name; matches are left out of bundles.
    pub exclude_patterns: Vec<String>,
    /// Project names that carry no information and are treated as absent (case-insensitive).
    pub placeholder_names: Vec<String>,
    pub max_name_attempts: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            jobs: 1,
            timestamp_backend: TimestampBackend::Native,
            exclude_patterns: vec![".DS_Store".to_string()],
            placeholder_names: vec!["Untitled Artwork".to_string(), "Untitled".to_string()],
            max_name_attempts: 999,
        }
    }
}

impl AppConfig {
    /// Destination directory for bundles: the configured one, or a
    /// `Procreate Recovered` folder next to the input root.
    pub fn resolve_output_dir(&self, input_root: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => input_root
                .parent()
                .unwrap_or(input_root)
                .join(DEFAULT_OUTPUT_DIR_NAME),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("PROCREATE_RESCUE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("exclude_patterns")
                .with_list_parse_key("placeholder_names"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
