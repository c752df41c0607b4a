use eyre::{eyre, WrapErr};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::config::{GlobalSitePaths, Mode, SiteConfig, SitePaths};
use crate::core::data::DataStore;
use crate::core::sitemap::Sitemap;
use crate::render::{Engines, RenderContext, Resolver, SourceFinder};
use crate::util::compile_globs;
use crate::{AbsPath, Result, USER_LOG};

/// Extension names activated in `site.toml`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extensions(Vec<String>);

impl Extensions {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn is_activated(&self, name: &str) -> bool {
        self.0.iter().any(|ext| ext == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

/// Log sink for messages originating from templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Logger {
    pub fn debug<S: AsRef<str>>(&self, msg: S) {
        debug!(target: USER_LOG, "{}", msg.as_ref());
    }

    pub fn info<S: AsRef<str>>(&self, msg: S) {
        info!(target: USER_LOG, "{}", msg.as_ref());
    }

    pub fn warn<S: AsRef<str>>(&self, msg: S) {
        warn!(target: USER_LOG, "{}", msg.as_ref());
    }

    pub fn error<S: AsRef<str>>(&self, msg: S) {
        error!(target: USER_LOG, "{}", msg.as_ref());
    }
}

/// Everything a page render reads from: configuration, sitemap, engines and
/// data. Immutable while rendering.
#[derive(Debug)]
pub struct Site {
    paths: GlobalSitePaths,
    source_dir: AbsPath,
    config: SiteConfig,
    mode: Mode,
    engines: Engines,
    sitemap: Sitemap,
    data: DataStore,
    extensions: Extensions,
    logger: Logger,
}

impl Site {
    pub fn load<P: AsRef<Path>>(project_root: P, mode: Mode) -> Result<Self> {
        Self::load_with_engines(project_root, mode, Engines::with_defaults())
    }

    #[instrument(skip_all, fields(root = ?project_root.as_ref(), ?mode))]
    pub fn load_with_engines<P: AsRef<Path>>(
        project_root: P,
        mode: Mode,
        engines: Engines,
    ) -> Result<Self> {
        let project_root = AbsPath::new(project_root.as_ref())
            .wrap_err("project root must be an absolute path")?;

        let config = SiteConfig::load(&project_root).wrap_err("failed loading site config")?;
        let paths = Arc::new(SitePaths::from_config(project_root, &config)?);
        let source_dir = paths.absolute_source_dir();

        let ignore = compile_globs(&config.ignore).wrap_err("invalid `ignore` pattern")?;
        let sitemap = Sitemap::discover(&paths, &engines, &ignore).wrap_err_with(|| {
            format!("failed building sitemap from '{}'", source_dir)
        })?;

        let data = DataStore::load(&paths.absolute_data_dir()).wrap_err("failed loading data")?;
        let extensions = Extensions::new(config.extensions.clone());

        Ok(Self {
            paths,
            source_dir,
            config,
            mode,
            engines,
            sitemap,
            data,
            extensions,
            logger: Logger,
        })
    }

    pub fn paths(&self) -> GlobalSitePaths {
        Arc::clone(&self.paths)
    }

    pub fn source_dir(&self) -> &AbsPath {
        &self.source_dir
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_build_mode(&self) -> bool {
        self.mode == Mode::Build
    }

    pub fn is_server_mode(&self) -> bool {
        self.mode == Mode::Server
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    pub fn sitemap(&self) -> &Sitemap {
        &self.sitemap
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn finder(&self) -> SourceFinder<'_> {
        SourceFinder::new(&self.source_dir, &self.engines)
    }

    pub fn resolver(&self) -> Resolver<'_, SourceFinder<'_>> {
        Resolver::new(
            self.finder(),
            &self.sitemap,
            &self.engines,
            self.paths.layouts_dir(),
        )
    }

    /// Renders the page published at `destination_path` in a fresh render context.
    #[instrument(skip(self))]
    pub fn render_page(&self, destination_path: &str) -> Result<String> {
        let resource = self
            .sitemap
            .find_resource_by_destination_path(destination_path)
            .ok_or_else(|| eyre!("no page is published at '{}'", destination_path))?;
        if resource.is_ignored() {
            return Err(eyre!(
                "'{}' is a partial or layout and is not rendered as a page",
                resource.source_file()
            ));
        }

        let mut ctx = RenderContext::for_resource(self, resource);
        ctx.render_resource(resource)
    }
}
