//! Handlers for `hubsearch config {path,show,init}`.

use hubsearch_core::{Error, Result};
use std::path::{Path, PathBuf};

use crate::cli::ConfigAction;
use crate::config::HubsearchConfig;

/// Handle a config subcommand.
///
/// Receives the raw `--config` path because `path` and `init` work before a
/// config file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Show => {
            let config = HubsearchConfig::load(config_path)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ConfigAction::Init { file, force } => {
            let path = match file {
                Some(p) => PathBuf::from(p),
                None => HubsearchConfig::default_config_path()
                    .ok_or_else(|| Error::config("Could not determine config directory"))?,
            };
            write_default_config(&path, force)?;
            println!("Config file created at {}", path.display());
            Ok(())
        }
    }
}

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    match HubsearchConfig::resolve_config_path(config_path) {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("(file does not exist; run `hubsearch config init` to create it)");
            }
            Ok(())
        }
        None => Err(Error::config(
            "Could not determine config directory for this platform",
        )),
    }
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = HubsearchConfig::default().to_toml_string()?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        write_default_config(&path, false).unwrap();
        let loaded = HubsearchConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded, HubsearchConfig::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(matches!(
            write_default_config(&path, false),
            Err(Error::Config(_))
        ));
        write_default_config(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[server]"));
    }

    #[test]
    fn test_handle_init_and_show() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let file = path.to_str().unwrap().to_string();

        handle_config_command(
            None,
            ConfigAction::Init {
                file: Some(file.clone()),
                force: false,
            },
        )
        .unwrap();
        handle_config_command(Some(&file), ConfigAction::Show).unwrap();
        handle_config_command(Some(&file), ConfigAction::Path).unwrap();
    }
}
