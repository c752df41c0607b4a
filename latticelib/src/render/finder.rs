use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use tracing::trace;

use crate::core::SourceFile;
use crate::render::{EngineId, Engines};
use crate::{AbsPath, RelPath};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FindOptions {
    pub preferred_engine: Option<EngineId>,
    pub try_static: bool,
}

impl FindOptions {
    pub fn preferring(engine: Option<&EngineId>) -> Self {
        Self {
            preferred_engine: engine.cloned(),
            try_static: false,
        }
    }

    #[must_use]
    pub fn with_static(mut self) -> Self {
        self.try_static = true;
        self
    }
}

/// Locates template or static files by extension-less path.
pub trait FileLookup {
    fn find(&self, path: &RelPath, options: &FindOptions) -> Option<SourceFile>;
}

/// [`FileLookup`] over the site's source directory.
#[derive(Debug, Clone, Copy)]
pub struct SourceFinder<'a> {
    source_dir: &'a AbsPath,
    engines: &'a Engines,
}

impl<'a> SourceFinder<'a> {
    pub fn new(source_dir: &'a AbsPath, engines: &'a Engines) -> Self {
        Self {
            source_dir,
            engines,
        }
    }

    fn regular_file(&self, path: RelPath) -> Option<SourceFile> {
        let file = SourceFile::new(self.source_dir, path);
        file.exists().then(|| file)
    }

    /// Sibling files `<name>.<...>.<ext>` with a registered engine for `ext`,
    /// first by engine declaration order and then by file name.
    fn find_with_engine(&self, path: &RelPath) -> Option<SourceFile> {
        let name = path.file_name().and_then(OsStr::to_str)?;
        let prefix = format!("{}.", name);
        let dir = self.source_dir.join(&path.parent());
        let entries = std::fs::read_dir(dir.as_path()).ok()?;

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|file_name| file_name.len() > prefix.len() && file_name.starts_with(&prefix))
            .filter_map(|file_name| {
                let ext = file_name.rsplit('.').next()?;
                let position = self.engines.position(ext)?;
                Some((position, file_name))
            })
            .sorted()
            .next()
            .map(|(_, file_name)| SourceFile::new(self.source_dir, path.with_file_name(file_name)))
    }
}

impl<'a> FileLookup for SourceFinder<'a> {
    fn find(&self, path: &RelPath, options: &FindOptions) -> Option<SourceFile> {
        if path.is_empty() {
            return None;
        }

        if let Some(engine) = &options.preferred_engine {
            if self.engines.has_engine_for(engine.as_str()) {
                let preferred = path.with_appended_extension(engine.as_str());
                if let Some(file) = self.regular_file(preferred) {
                    trace!(file = %file, "found with preferred engine");
                    return Some(file);
                }
            }
        }

        if let Some(file) = self.find_with_engine(path) {
            trace!(file = %file, "found with registered engine");
            return Some(file);
        }

        if options.try_static {
            return self.regular_file(path.clone());
        }
        None
    }
}
