use eyre::WrapErr;
use serde::Serialize;
use slotmap::SlotMap;
use std::collections::HashMap;
use tracing::{instrument, trace};

use crate::core::config::SitePaths;
use crate::core::source::{split_extensions, SourceFile};
use crate::render::Engines;
use crate::util::Glob;
use crate::{RelPath, Result};

slotmap::new_key_type! {
    pub struct ResourceKey;
}

/// A sitemap entry: one source file and the output path it renders to.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    destination_path: String,
    source_file: SourceFile,
    is_template: bool,
    ignored: bool,
}

impl Resource {
    pub fn new(
        destination_path: String,
        source_file: SourceFile,
        is_template: bool,
        ignored: bool,
    ) -> Self {
        Self {
            destination_path,
            source_file,
            is_template,
            ignored,
        }
    }

    /// Builds the resource for `file`. Partials (leading underscore) and
    /// anything under the layouts directory are kept but marked ignored.
    pub fn from_source(file: SourceFile, engines: &Engines, layouts_dir: &RelPath) -> Self {
        let is_template = engines.engine_for_path(file.relative_path()).is_some();
        let ignored =
            file.file_name().starts_with('_') || file.relative_path().starts_with(layouts_dir);
        let destination_path = destination_path_for(file.relative_path(), engines);
        Self::new(destination_path, file, is_template, ignored)
    }

    pub fn destination_path(&self) -> &str {
        &self.destination_path
    }

    pub fn source_file(&self) -> &SourceFile {
        &self.source_file
    }

    pub fn is_template(&self) -> bool {
        self.is_template
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}

/// Strips trailing template-engine extensions: `blog/post.html.md.tpl` becomes
/// `blog/post.html`. A template left without any extension gets `.html`.
pub fn destination_path_for(path: &RelPath, engines: &Engines) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, mut extensions) = split_extensions(&name);

    let mut stripped = false;
    while let Some(ext) = extensions.last() {
        if !engines.has_engine_for(ext) {
            break;
        }
        extensions.pop();
        stripped = true;
    }
    if stripped && extensions.is_empty() {
        extensions.push("html");
    }

    let file_name = std::iter::once(stem)
        .chain(extensions)
        .collect::<Vec<_>>()
        .join(".");
    path.with_file_name(file_name).to_slash_string()
}

fn normalize_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[derive(Debug, Clone, Default)]
pub struct Sitemap {
    resources: SlotMap<ResourceKey, Resource>,
    by_destination: HashMap<String, ResourceKey>,
    by_source: HashMap<String, ResourceKey>,
}

impl Sitemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks the source directory and registers every file not matched by an
    /// `ignore` glob.
    #[instrument(skip(engines, ignore))]
    pub fn discover(paths: &SitePaths, engines: &Engines, ignore: &[Glob]) -> Result<Self> {
        let source_dir = paths.absolute_source_dir();
        let mut files = crate::util::get_all_paths(&source_dir, &|path| path.is_file())
            .wrap_err_with(|| format!("Failed discovering source files in '{}'", source_dir))?;
        files.sort_by(|a, b| a.as_path().cmp(b.as_path()));

        let mut sitemap = Self::new();
        for path in files {
            let relative = path.strip_prefix(&source_dir)?;
            if ignore.iter().any(|glob| glob.is_match(relative.as_path())) {
                trace!(file = %relative, "excluded from sitemap by ignore pattern");
                continue;
            }
            let file = SourceFile::new(&source_dir, relative);
            sitemap.insert(Resource::from_source(file, engines, paths.layouts_dir()));
        }
        Ok(sitemap)
    }

    pub fn insert(&mut self, resource: Resource) -> ResourceKey {
        trace!(destination = %resource.destination_path, "inserting resource into sitemap");

        let destination = resource.destination_path.clone();
        let source = resource.source_file.relative_path().to_slash_string();
        let key = self.resources.insert(resource);

        self.by_destination.insert(destination, key);
        self.by_source.insert(source, key);
        key
    }

    pub fn get(&self, key: ResourceKey) -> Option<&Resource> {
        self.resources.get(key)
    }

    pub fn find_resource_by_destination_path(&self, path: &str) -> Option<&Resource> {
        let key = self.by_destination.get(normalize_key(path))?;
        self.resources.get(*key)
    }

    pub fn find_resource_by_source_path(&self, path: &RelPath) -> Option<&Resource> {
        let key = self.by_source.get(&path.to_slash_string())?;
        self.resources.get(*key)
    }

    pub fn file_to_destination_path(&self, file: &SourceFile) -> Option<&str> {
        self.find_resource_by_source_path(file.relative_path())
            .map(Resource::destination_path)
    }

    pub fn iter(&self) -> slotmap::basic::Iter<'_, ResourceKey, Resource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<'a> IntoIterator for &'a Sitemap {
    type Item = (ResourceKey, &'a Resource);
    type IntoIter = slotmap::basic::Iter<'a, ResourceKey, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
