use crate::error::{Result, WeaveError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default include directive: `{% include "relative/path" %}`
pub const DEFAULT_INCLUDE_PATTERN: &str = r#"\{%\s*include\s+"([A-Za-z0-9._/\-]+)"\s*%\}"#;

/// Default variable placeholder: `{{ name }}`, whitespace inside the braces optional
pub const DEFAULT_VARIABLE_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.\-\[\]]+)\s*\}\}";

/// Maximum include nesting before resolution gives up
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// What to do when an include directive names a file that does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIncludePolicy {
    /// Abort the render with `NotFound`
    #[default]
    Fail,
    /// Log a warning and leave the directive unexpanded
    Warn,
}

/// What to do when a placeholder has no renderable value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVariablePolicy {
    /// Echo the placeholder unchanged
    #[default]
    Echo,
    /// Echo the placeholder and log every omission
    Report,
}

/// Comparison used to decide whether a cache entry is still fresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessCheck {
    /// Fresh while the file's mtime is `<=` the recorded timestamp
    #[default]
    Inclusive,
    /// Fresh only while the file's mtime is `<` the recorded timestamp
    Strict,
}

impl FreshnessCheck {
    pub fn is_fresh(self, recorded: SystemTime, modified: SystemTime) -> bool {
        match self {
            Self::Inclusive => modified <= recorded,
            Self::Strict => modified < recorded,
        }
    }
}

/// Configuration for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory include paths are resolved against
    pub base_dir: PathBuf,
    /// Regex for include directives; capture group 1 is the path
    pub include_pattern: String,
    /// Regex for variable placeholders; capture group 1 is the key
    pub variable_pattern: String,
    pub missing_include: MissingIncludePolicy,
    pub missing_variable: MissingVariablePolicy,
    pub freshness: FreshnessCheck,
    /// Maximum include nesting depth
    pub max_include_depth: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            include_pattern: DEFAULT_INCLUDE_PATTERN.to_string(),
            variable_pattern: DEFAULT_VARIABLE_PATTERN.to_string(),
            missing_include: MissingIncludePolicy::default(),
            missing_variable: MissingVariablePolicy::default(),
            freshness: FreshnessCheck::default(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl RenderConfig {
    /// Loads overrides from a JSON file. Keys not present keep their defaults.
    ///
    /// # Errors
    ///
    /// - `WeaveError::NotFound` if the file doesn't exist.
    /// - `WeaveError::Json` if the file isn't a valid config object.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = crate::fs_utils::read_file_contents(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Compiles the configured token patterns
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidPattern` if a pattern is invalid or has no capture group.
    pub fn syntax(&self) -> Result<Syntax> {
        Syntax::new(&self.include_pattern, &self.variable_pattern)
    }
}

/// Compiled token patterns
#[derive(Debug, Clone)]
pub struct Syntax {
    pub(crate) include: Regex,
    pub(crate) variable: Regex,
}

impl Syntax {
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidPattern` if a pattern is invalid or has no capture group.
    pub fn new(include_pattern: &str, variable_pattern: &str) -> Result<Self> {
        Ok(Self {
            include: compile(include_pattern)?,
            variable: compile(variable_pattern)?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|e| WeaveError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    if regex.captures_len() < 2 {
        return Err(WeaveError::InvalidPattern {
            pattern: pattern.to_string(),
            message: "pattern needs a capture group".to_string(),
        });
    }
    Ok(regex)
}
