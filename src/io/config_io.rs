use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::ClientConfig;

pub const CONFIG_FILE: &str = "corkboard.toml";

/// Error type for config I/O operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no corkboard.toml found in this directory or any parent")]
    NotFound,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse corkboard.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Discover the config file by walking up from the given directory.
pub fn discover_config(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Read the config, returning both the parsed config and the raw toml_edit
/// document for round-trip-safe editing.
pub fn read_config(path: &Path) -> Result<(ClientConfig, toml_edit::DocumentMut), ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config: ClientConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text
        .parse()
        .map_err(|_: toml_edit::TomlError| ConfigError::ParseError(
            toml::from_str::<ClientConfig>("").unwrap_err(),
        ))?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    fs::write(path, doc.to_string()).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Update the bound board id in the config document
pub fn set_board_id(doc: &mut toml_edit::DocumentMut, board_id: &str) {
    if !doc.contains_key("board") {
        doc["board"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["board"]["id"] = toml_edit::value(board_id);
}

/// Update the API base URL in the config document
pub fn set_base_url(doc: &mut toml_edit::DocumentMut, base_url: &str) {
    if !doc.contains_key("api") {
        doc["api"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["api"]["base_url"] = toml_edit::value(base_url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"[api]
base_url = "http://localhost:3000/api"
timeout_secs = 10

[board]
id = "b-main"

[user]
email = "dev@example.com"
"#
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, sample_config()).unwrap();

        let (config, doc) = read_config(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:3000/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.board.id, "b-main");

        write_config(&path, &doc).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, sample_config());
    }

    #[test]
    fn test_timeout_defaults_when_absent() {
        let config: ClientConfig =
            toml::from_str("[api]\nbase_url = \"http://x\"\n").unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.board.id, "");
    }

    #[test]
    fn test_discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), sample_config()).unwrap();
        let sub = tmp.path().join("a").join("b");
        fs::create_dir_all(&sub).unwrap();

        let found = discover_config(&sub).unwrap();
        assert_eq!(found, tmp.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_discover_not_found() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_config(tmp.path()),
            Err(ConfigError::NotFound)
        ));
    }

    #[test]
    fn test_set_board_id_preserves_rest() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_board_id(&mut doc, "b-other");
        let result = doc.to_string();
        assert!(result.contains("id = \"b-other\""));
        assert!(result.contains("email = \"dev@example.com\""));
    }

    #[test]
    fn test_set_base_url_creates_table() {
        let mut doc: toml_edit::DocumentMut = "".parse().unwrap();
        set_base_url(&mut doc, "http://localhost:4000/api");
        set_board_id(&mut doc, "b1");
        let config: ClientConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:4000/api");
        assert_eq!(config.board.id, "b1");
    }
}
