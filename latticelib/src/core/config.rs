use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{instrument, trace};

use crate::{AbsPath, RelPath, Result};

pub const CONFIG_FILE: &str = "site.toml";
pub const DEFAULT_LAYOUT: &str = "layout";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize)]
pub enum Mode {
    #[default]
    Build,
    Server,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.to_lowercase();
        match s.as_ref() {
            "build" => Ok(Mode::Build),
            "server" | "serve" => Ok(Mode::Server),
            _ => Err("unknown mode".to_owned()),
        }
    }
}

/// A layout selection, either by name or switched on/off.
///
/// `true` means "use the default layout" and `false` disables layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSetting {
    Toggle(bool),
    Named(String),
}

impl LayoutSetting {
    pub fn resolve<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        match self {
            LayoutSetting::Toggle(false) => None,
            LayoutSetting::Toggle(true) => default,
            LayoutSetting::Named(name) => Some(name.as_str()),
        }
    }
}

impl Default for LayoutSetting {
    fn default() -> Self {
        LayoutSetting::Named(DEFAULT_LAYOUT.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub source_dir: PathBuf,
    /// Relative to `source_dir`.
    pub layouts_dir: PathBuf,
    pub data_dir: PathBuf,
    pub layout: LayoutSetting,
    /// Globs (relative to `source_dir`) excluded from the sitemap.
    pub ignore: Vec<String>,
    pub extensions: Vec<String>,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            layouts_dir: PathBuf::from("layouts"),
            data_dir: PathBuf::from("data"),
            layout: LayoutSetting::default(),
            ignore: vec![],
            extensions: vec![],
            meta: serde_json::Map::new(),
        }
    }
}

impl SiteConfig {
    /// Loads `site.toml` from the project root. A missing file yields the defaults.
    #[instrument]
    pub fn load(project_root: &AbsPath) -> Result<Self> {
        let path = project_root.as_path().join(CONFIG_FILE);
        if !path.exists() {
            trace!("no site config found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("Failed reading site config at '{}'", path.display()))?;
        Self::from_toml(&raw)
            .wrap_err_with(|| format!("Failed parsing site config at '{}'", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn default_layout(&self) -> Option<&str> {
        self.layout.resolve(Some(DEFAULT_LAYOUT))
    }

    /// Looks up a value in the `[meta]` table.
    pub fn lookup(&self, path: &[&str]) -> Option<&serde_json::Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.meta.get(*first)?, |value, key| value.get(key))
    }
}

pub type GlobalSitePaths = Arc<SitePaths>;

#[derive(Debug, Clone, Serialize)]
pub struct SitePaths {
    pub project_root: AbsPath,
    pub source_dir: RelPath,
    pub layouts_dir: RelPath,
    pub data_dir: RelPath,
}

impl SitePaths {
    pub fn from_config(project_root: AbsPath, config: &SiteConfig) -> Result<Self> {
        Ok(Self {
            project_root,
            source_dir: RelPath::new(&config.source_dir)
                .wrap_err("`source_dir` must be relative to the project root")?,
            layouts_dir: RelPath::new(&config.layouts_dir)
                .wrap_err("`layouts_dir` must be relative to the source dir")?,
            data_dir: RelPath::new(&config.data_dir)
                .wrap_err("`data_dir` must be relative to the project root")?,
        })
    }

    pub fn project_root(&self) -> &AbsPath {
        &self.project_root
    }

    pub fn source_dir(&self) -> &RelPath {
        &self.source_dir
    }
    pub fn absolute_source_dir(&self) -> AbsPath {
        self.project_root.join(self.source_dir())
    }

    pub fn layouts_dir(&self) -> &RelPath {
        &self.layouts_dir
    }
    pub fn absolute_layouts_dir(&self) -> AbsPath {
        self.absolute_source_dir().join(self.layouts_dir())
    }

    pub fn data_dir(&self) -> &RelPath {
        &self.data_dir
    }
    pub fn absolute_data_dir(&self) -> AbsPath {
        self.project_root.join(self.data_dir())
    }
}

impl AsRef<Path> for SitePaths {
    fn as_ref(&self) -> &Path {
        self.project_root.as_path()
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_uses_defaults() {
        let config = SiteConfig::from_toml("").unwrap();
        assert_eq!(config, SiteConfig::default());
        assert_eq!(config.default_layout(), Some("layout"));
    }

    #[test]
    fn layout_can_be_disabled() {
        let config = SiteConfig::from_toml("layout = false").unwrap();
        assert_eq!(config.default_layout(), None);
    }

    #[test]
    fn layout_can_be_renamed() {
        let config = SiteConfig::from_toml(r#"layout = "base""#).unwrap();
        assert_eq!(config.default_layout(), Some("base"));
    }

    #[test]
    fn looks_up_meta_values() {
        let config = SiteConfig::from_toml(
            r#"
            [meta]
            title = "My Site"
            [meta.author]
            name = "Sam"
            "#,
        )
        .unwrap();
        assert_eq!(config.lookup(&["title"]), Some(&json!("My Site")));
        assert_eq!(config.lookup(&["author", "name"]), Some(&json!("Sam")));
        assert_eq!(config.lookup(&["missing"]), None);
    }

    #[test]
    fn parses_mode() {
        assert_eq!("build".parse::<Mode>(), Ok(Mode::Build));
        assert_eq!("Server".parse::<Mode>(), Ok(Mode::Server));
        assert!("other".parse::<Mode>().is_err());
    }

    #[test]
    fn rejects_absolute_source_dir() {
        let config = SiteConfig::from_toml(r#"source_dir = "/abs""#).unwrap();
        let root = AbsPath::new("/project").unwrap();
        assert!(SitePaths::from_config(root, &config).is_err());
    }
}
