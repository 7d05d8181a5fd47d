use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::errors::{DeckhandError, Result};

/// A dotenv-style file, loaded wholesale and rewritten wholesale so that
/// unrelated keys survive edits. Values containing anything beyond plain
/// token characters are double-quoted with escaping, which is what the
/// encrypted keystore JSON needs.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    entries: IndexMap<String, String>,
}

impl EnvFile {
    /// A missing file loads as empty; it is created on the first save.
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = IndexMap::new();
        if path.exists() {
            let iter = dotenvy::from_path_iter(path).map_err(|e| {
                DeckhandError::Config(format!("unable to parse {}: {}", path.display(), e))
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| {
                    DeckhandError::Config(format!("unable to parse {}: {}", path.display(), e))
                })?;
                entries.insert(key, value);
            }
        }
        Ok(EnvFile { path: path.to_path_buf(), entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn save(&self) -> Result<()> {
        let mut rendered = String::new();
        for (key, value) in &self.entries {
            rendered.push_str(key);
            rendered.push('=');
            rendered.push_str(&quote_value(value));
            rendered.push('\n');
        }
        std::fs::write(&self.path, rendered)?;
        Ok(())
    }
}

fn quote_value(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '@'));
    if plain {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
