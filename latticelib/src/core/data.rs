use eyre::{eyre, WrapErr};
use serde::Serialize;
use tracing::{instrument, trace};

use crate::{AbsPath, Result};

/// Site data loaded from `*.toml` and `*.json` files in the data directory,
/// keyed by file stem.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataStore {
    data: serde_json::Map<String, serde_json::Value>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument]
    pub fn load(data_dir: &AbsPath) -> Result<Self> {
        let mut store = Self::new();
        if !data_dir.is_dir() {
            trace!("no data directory found");
            return Ok(store);
        }

        let mut paths = crate::util::get_all_paths(data_dir, &|path| path.is_file())
            .wrap_err_with(|| format!("Failed discovering data files in '{}'", data_dir))?;
        paths.sort_by(|a, b| a.as_path().cmp(b.as_path()));

        for path in paths {
            let path = path.as_path();
            let key = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(key) => key.to_owned(),
                None => continue,
            };
            let raw = || {
                std::fs::read_to_string(path)
                    .wrap_err_with(|| format!("Failed reading data file '{}'", path.display()))
            };
            let value: serde_json::Value = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => toml::from_str(&raw()?)
                    .wrap_err_with(|| format!("Failed parsing data file '{}'", path.display()))?,
                Some("json") => serde_json::from_str(&raw()?)
                    .wrap_err_with(|| format!("Failed parsing data file '{}'", path.display()))?,
                _ => {
                    trace!(file = %path.display(), "skipping unsupported data file");
                    continue;
                }
            };
            store.insert(key, value)?;
        }
        Ok(store)
    }

    pub fn insert<S: Into<String>>(&mut self, key: S, value: serde_json::Value) -> Result<()> {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(eyre!("duplicate data key '{}'", key));
        }
        self.data.insert(key, value);
        Ok(())
    }

    pub fn lookup(&self, path: &[&str]) -> Option<&serde_json::Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.data.get(*first)?, |value, key| value.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
