//! Generation configuration.
//!
//! The engine consumes a handful of values it does not compute: the
//! output root, the common prefixes stripped from source and module
//! paths, the module slug scheme, and exclusion globs for source
//! rendering. Configs are YAML or JSON, chosen by file extension.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Slug scheme for file modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlugScheme {
    /// `foo/bar/index.js` keeps its full slug, `foo_bar_index`.
    #[default]
    Full,
    /// `foo/bar/index.js` takes its directory's slug, `foo_bar`; if a
    /// sibling module already owns that slug the index module falls back
    /// to its full slug.
    ElideIndex,
}

/// Top-level generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Directory the generated documentation is written to.
    #[serde(default)]
    pub output: PathBuf,
    /// Common prefix stripped from source paths when rendering them under
    /// `source/`.
    #[serde(default)]
    pub source_prefix: PathBuf,
    /// Common prefix stripped from CommonJS module paths when computing
    /// module slugs.
    #[serde(default)]
    pub module_prefix: PathBuf,
    /// File-module slug scheme.
    #[serde(default)]
    pub module_slugs: SlugScheme,
    /// Glob patterns for source paths excluded from rendering
    /// (e.g., "**/*_test.js").
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Config {
    /// Parse a configuration file, YAML or JSON by extension.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: Config = match ext {
            "json" => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Check if a source path is excluded from rendering.
    /// Uses globset for matching, which supports `**` for recursive
    /// directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.exclude.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.exclude {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.output.as_os_str().is_empty() {
        anyhow::bail!("no output directory configured");
    }

    // Validate exclusion glob patterns compile
    for pattern in &config.exclude {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid exclude pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}
