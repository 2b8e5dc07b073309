use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// The caller's `sea/config.json`, validated once at the boundary.
///
/// The engine itself never sees this structure; the CLI projects it down to
/// an [`AcquireRequest`](crate::AcquireRequest). Fields the packaging steps
/// consume (`copyFiles`, `esbuild`) are carried opaquely for those
/// downstream tools.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeaConfig {
    /// Entry point of the application to embed.
    pub main: String,
    /// Where the SEA blob is written.
    pub output: String,
    /// Extra files copied verbatim into the build output.
    #[serde(default, rename = "copyFiles")]
    pub copy_files: Vec<String>,
    /// Options forwarded untouched to the bundler step.
    #[serde(default)]
    pub esbuild: Option<serde_json::Value>,
    /// Node.js version specifier; the CLI flag takes precedence.
    #[serde(default, rename = "nodeVersion")]
    pub node_version: Option<String>,
}

impl SeaConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config: SeaConfig = serde_json::from_str(&text)
            .with_context(|| format!("could not parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.main.trim().is_empty() {
            bail!("config field `main` must not be empty");
        }
        if self.output.trim().is_empty() {
            bail!("config field `output` must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(json: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, json).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_config(
            r#"{
                "main": "sea/blob.js",
                "output": "dist/app.blob",
                "copyFiles": ["assets/logo.png"],
                "esbuild": { "bundle": true },
                "nodeVersion": "18.19.0"
            }"#,
        );
        let config = SeaConfig::load(&path).unwrap();
        assert_eq!(config.main, "sea/blob.js");
        assert_eq!(config.copy_files, vec!["assets/logo.png"]);
        assert_eq!(config.node_version.as_deref(), Some("18.19.0"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        // A typo must fail loudly, not be dropped.
        let (_dir, path) = write_config(
            r#"{ "main": "a.js", "output": "b.blob", "copyfiles": ["assets/logo.png"] }"#,
        );
        assert!(SeaConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_output_is_rejected() {
        let (_dir, path) = write_config(r#"{ "main": "sea/blob.js", "output": "" }"#);
        assert!(SeaConfig::load(&path).is_err());
    }

    #[test]
    fn test_optional_fields_default() {
        let (_dir, path) = write_config(r#"{ "main": "a.js", "output": "b.blob" }"#);
        let config = SeaConfig::load(&path).unwrap();
        assert!(config.copy_files.is_empty());
        assert!(config.esbuild.is_none());
        assert!(config.node_version.is_none());
    }
}
