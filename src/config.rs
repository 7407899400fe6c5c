//! Configuration file support for ferro-sift.
//!
//! This module loads `.ferro-sift.toml` files holding defaults for the
//! `annotate` and `filter` commands.
//!
//! # Example Configuration
//!
//! ```toml
//! [annotate]
//! fields = ["SIFT_pred", "GERP++_RS"]
//! annotate-empty = false
//! collapse = true
//! min-jump = 100
//! prefix = "dbNSFP_"
//!
//! [filter]
//! format = "ann"
//! ```
//!
//! # Config File Locations
//!
//! Configuration is searched in this order (first found wins):
//! 1. `.ferro-sift.toml` in current directory
//! 2. `~/.config/ferro/sift.toml`
//!
//! CLI flags take precedence over config file settings.

use std::fs;
use std::path::{Path, PathBuf};

use crate::annotate::{AnnotationConfig, DBNSFP_PREFIX};
use crate::error::SiftError;
use crate::vcf::EffectFormat;

/// Parsed configuration from a .ferro-sift.toml file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiftConfig {
    /// `[annotate]` section.
    pub annotate: AnnotateSection,
    /// `[filter]` section.
    pub filter: FilterSection,
}

/// Annotate section of the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotateSection {
    pub fields: Vec<String>,
    pub annotate_empty: Option<bool>,
    pub collapse: Option<bool>,
    pub min_jump: Option<u64>,
    pub prefix: Option<String>,
}

/// Filter section of the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSection {
    /// Effect list layout, `ann` or `eff`.
    pub format: Option<String>,
}

/// Annotation settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct AnnotateOverrides {
    pub fields: Vec<String>,
    pub annotate_empty: bool,
    pub collapse: Option<bool>,
    pub min_jump: Option<u64>,
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Annotate,
    Filter,
    Other,
}

impl SiftConfig {
    /// Load configuration from the default locations.
    ///
    /// Searches for config in:
    /// 1. `.ferro-sift.toml` in current directory
    /// 2. `~/.config/ferro/sift.toml`
    pub fn load() -> Option<Self> {
        let cwd_config = PathBuf::from(".ferro-sift.toml");
        if cwd_config.exists() {
            if let Ok(config) = Self::load_from_path(&cwd_config) {
                return Some(config);
            }
        }

        if let Some(home) = dirs_home() {
            let home_config = home.join(".config").join("ferro").join("sift.toml");
            if home_config.exists() {
                if let Ok(config) = Self::load_from_path(&home_config) {
                    return Some(config);
                }
            }
        }

        None
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = SiftConfig::default();
        let mut section = Section::Other;

        for (number, line) in content.lines().enumerate() {
            let line = strip_comment(line).trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                section = match &line[1..line.len() - 1] {
                    "annotate" => Section::Annotate,
                    "filter" => Section::Filter,
                    _ => Section::Other,
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse(format!(
                    "line {}: expected 'key = value'",
                    number + 1
                )));
            };
            let key = key.trim();
            let value = value.trim();
            let at = |msg: &str| ConfigError::Parse(format!("line {}: {} for '{}'", number + 1, msg, key));

            match (section, key) {
                (Section::Annotate, "fields") => {
                    config.annotate.fields = parse_string_array(value);
                }
                (Section::Annotate, "annotate-empty") => {
                    config.annotate.annotate_empty = Some(parse_bool(value).ok_or_else(|| at("expected true or false"))?);
                }
                (Section::Annotate, "collapse") => {
                    config.annotate.collapse = Some(parse_bool(value).ok_or_else(|| at("expected true or false"))?);
                }
                (Section::Annotate, "min-jump") => {
                    let jump = value.parse::<u64>().map_err(|_| at("expected a non-negative integer"))?;
                    config.annotate.min_jump = Some(jump);
                }
                (Section::Annotate, "prefix") => {
                    config.annotate.prefix = Some(unquote(value).to_string());
                }
                (Section::Filter, "format") => {
                    config.filter.format = Some(unquote(value).to_string());
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Effect list layout for `filter`, CLI first.
    pub fn effect_format(&self, cli: Option<EffectFormat>) -> Result<Option<EffectFormat>, SiftError> {
        match (cli, &self.filter.format) {
            (Some(format), _) => Ok(Some(format)),
            (None, Some(text)) => text.parse::<EffectFormat>().map(Some),
            (None, None) => Ok(None),
        }
    }

    /// Merge this config with CLI arguments into annotation settings.
    /// CLI arguments take precedence; the prefix defaults to `dbNSFP_`.
    pub fn merge_with_cli(&self, cli: &AnnotateOverrides) -> AnnotationConfig {
        let section = &self.annotate;
        let mut config = AnnotationConfig::new()
            .with_fields(section.fields.iter().cloned())
            .with_fields(cli.fields.iter().cloned())
            .with_annotate_empty(cli.annotate_empty || section.annotate_empty.unwrap_or(false))
            .with_collapse(cli.collapse.or(section.collapse).unwrap_or(false))
            .with_prefix(
                cli.prefix
                    .clone()
                    .or_else(|| section.prefix.clone())
                    .unwrap_or_else(|| DBNSFP_PREFIX.to_string()),
            );

        if let Some(jump) = cli.min_jump.or(section.min_jump) {
            config = config.with_min_jump(jump);
        }
        config
    }
}

/// Configuration loading error.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(String),
    /// Parse error in config file.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SiftError {
    fn from(err: ConfigError) -> Self {
        SiftError::configuration(err.to_string())
    }
}

/// Drop a `#` comment outside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '#') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim_matches('\'')
}

fn parse_bool(value: &str) -> Option<bool> {
    match unquote(value) {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a TOML array of strings like `["SIFT_pred", "GERP++_RS"]`.
fn parse_string_array(value: &str) -> Vec<String> {
    let value = value.trim();
    if !value.starts_with('[') || !value.ends_with(']') {
        return Vec::new();
    }

    let inner = &value[1..value.len() - 1];
    inner
        .split(',')
        .map(|s| unquote(s).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
