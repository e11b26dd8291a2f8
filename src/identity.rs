//! Client identity: one opaque id per installation, persisted on disk.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use uuid::Uuid;

const CLIENT_ID_FILE: &str = "client_id";

/// Load the client id from the app home, generating and persisting a fresh
/// UUID on first run. The id is read-only afterwards, so it stays stable
/// across restarts and correlates this installation server-side.
pub fn load_or_create(home: &Path) -> Result<String> {
    fs::create_dir_all(home).context("Failed to create app home directory")?;

    let path = home.join(CLIENT_ID_FILE);
    if path.exists() {
        let existing = fs::read_to_string(&path).context("Failed to read client id")?;
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = Uuid::new_v4().to_string();
    fs::write(&path, &id).context("Failed to write client id")?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_run_creates_an_id() {
        let dir = tempdir().expect("tempdir");
        let id = load_or_create(dir.path()).expect("load_or_create");
        assert!(!id.is_empty());
        assert!(dir.path().join(CLIENT_ID_FILE).exists());
    }

    #[test]
    fn id_is_stable_across_loads() {
        let dir = tempdir().expect("tempdir");
        let first = load_or_create(dir.path()).expect("first load");
        let second = load_or_create(dir.path()).expect("second load");
        assert_eq!(first, second);
    }

    #[test]
    fn blank_file_is_replaced() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(CLIENT_ID_FILE), "  \n").expect("seed blank file");
        let id = load_or_create(dir.path()).expect("load_or_create");
        assert!(!id.trim().is_empty());
    }
}
