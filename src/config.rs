use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = ".dwarf-hydra.yaml";

/// Settings read from `.dwarf-hydra.yaml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub whitelist: Vec<String>,
    pub output: Option<PathBuf>,
    pub preamble: Option<bool>,
}

impl Config {
    /// Reads `explicit` (which must exist) or, failing that, the default file
    /// in the working directory if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                Self::from_file(path)
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG);
                if default.exists() { Self::from_file(default) } else { Ok(Self::default()) }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Configured patterns first, then the command line ones.
    pub fn patterns(&self, cli: &[String]) -> Vec<String> {
        self.whitelist.iter().chain(cli).cloned().collect()
    }
}
