//! Configuration file loader with multi-source merging

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::file_config::FileConfig;

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit config path (if provided)
    /// 2. Project root: `./concord.toml` or `./.concord.toml`
    /// 3. Global: `~/.config/concord/config.toml`
    /// 4. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!(path = %global_path.display(), "merging global config");
                figment = figment.merge(Toml::file(&global_path));
            }
        }

        if let Some(path) = Self::project_config_path() {
            debug!(path = %path.display(), "merging project config");
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("concord").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        for filename in &["concord.toml", ".concord.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_defaults_has_empty_agents() {
        let config = ConfigLoader::load_defaults();
        assert!(config.agents.is_empty());
        assert_eq!(config.discussion.max_rounds, 3);
    }

    #[test]
    fn global_config_path_mentions_concord() {
        let path = ConfigLoader::global_config_path().unwrap();
        assert!(path.to_string_lossy().contains("concord"));
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[discussion]
max_rounds = 5
moderator = "lead"

[[agents]]
id = "arch"
role = "architect"
model = "claude-sonnet"
provider = "claude-cli"

[rate_limits.providers]
anthropic = 750
"#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.discussion.max_rounds, 5);
        assert_eq!(config.discussion.moderator, "lead");
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].id, "arch");
        // defaulted field survives the merge
        assert!(config.agents[0].enabled);
        assert_eq!(config.rate_limits.providers.get("anthropic"), Some(&750));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "agents = \"not a list\"").unwrap();
        assert!(ConfigLoader::load(Some(file.path())).is_err());
    }
}
