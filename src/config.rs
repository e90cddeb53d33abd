use crate::model::{BoardState, DEFAULT_BOARDS};
use crate::storage::validate_key;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional `config.yml`; every field falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub state_key: String,
    pub tasks_key: String,
    pub default_boards: Vec<String>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_key: "todo_state".into(),
            tasks_key: "todos".into(),
            default_boards: DEFAULT_BOARDS.iter().map(|s| s.to_string()).collect(),
            log_filter: "warn".into(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = match env::var_os("TODOBOARD_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let config: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {:?}", path))?;
        validate_key(&config.state_key).context("state_key")?;
        validate_key(&config.tasks_key).context("tasks_key")?;
        Ok(config)
    }

    /// The state used when nothing valid has been saved yet.
    pub fn default_state(&self) -> BoardState {
        let state = BoardState::with_boards(&self.default_boards);
        if state.is_empty() {
            BoardState::default_boards()
        } else {
            state
        }
    }
}

fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "todoboard").context("locating config directory")?;
    Ok(dirs.config_dir().join("config.yml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(&tmp.path().join("config.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_state(), BoardState::default_boards());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "default_boards: [Backlog, Review]\nlog_filter: debug\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.state_key, "todo_state");
        assert_eq!(config.log_filter, "debug");
        let names: Vec<_> = config.default_state().boards().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["Backlog", "Review"]);
    }

    #[test]
    fn empty_board_list_falls_back_to_builtin() {
        let config = Config {
            default_boards: vec![" ".into()],
            ..Config::default()
        };
        assert_eq!(config.default_state(), BoardState::default_boards());
    }

    #[test]
    fn bad_key_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "state_key: ../escape\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yml");
        fs::write(&path, "default_boards: {nope").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config file"));
    }
}
