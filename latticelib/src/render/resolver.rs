use itertools::Itertools;
use std::ffi::OsStr;
use tracing::{instrument, trace};

use crate::core::{Resource, Sitemap, SourceFile};
use crate::render::{EngineId, Engines, FileLookup, FindOptions};
use crate::RelPath;

/// One location tried during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub path: RelPath,
    pub options: FindOptions,
}

impl Candidate {
    fn new(path: RelPath, options: FindOptions) -> Option<Self> {
        path.normalize().map(|path| Self { path, options })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found { file: SourceFile, is_template: bool },
    NotFound { tried: Vec<String> },
}

/// Maps partial and layout references to source files.
#[derive(Debug)]
pub struct Resolver<'a, L: FileLookup> {
    lookup: L,
    sitemap: &'a Sitemap,
    engines: &'a Engines,
    layouts_dir: &'a RelPath,
}

impl<'a, L: FileLookup> Resolver<'a, L> {
    pub fn new(
        lookup: L,
        sitemap: &'a Sitemap,
        engines: &'a Engines,
        layouts_dir: &'a RelPath,
    ) -> Self {
        Self {
            lookup,
            sitemap,
            engines,
            layouts_dir,
        }
    }

    /// Candidate locations for `reference`, highest priority first.
    ///
    /// The directory-relative candidates only exist when the page being
    /// rendered is known. Candidates climbing out of the source root are
    /// dropped. `hint.try_static` lets the first two candidates match static
    /// files as well. The remaining candidates always do.
    pub fn candidates(
        &self,
        reference: &str,
        current: Option<&Resource>,
        hint: &FindOptions,
    ) -> Vec<Candidate> {
        let reference = match RelPath::new(strip_root(reference)) {
            Ok(path) => path,
            Err(_) => return vec![],
        };
        let toggled = toggle_underscore(&reference);
        let current = current.map(|resource| {
            let path = resource.source_file().relative_path();
            (path.parent(), self.engines.engine_for_path(path))
        });
        let preferred = hint.preferred_engine.as_ref();
        let early = |engine: Option<&EngineId>| FindOptions {
            preferred_engine: engine.cloned(),
            try_static: hint.try_static,
        };

        let mut candidates = vec![];
        if let Some((dir, engine)) = &current {
            let engine = preferred.or_else(|| engine.as_ref());
            candidates.push(Candidate::new(dir.join(&reference), early(engine)));
        }
        candidates.push(Candidate::new(reference.clone(), early(preferred)));
        candidates.push(Candidate::new(
            reference,
            FindOptions::preferring(preferred).with_static(),
        ));
        if let Some((dir, _)) = &current {
            candidates.push(Candidate::new(
                dir.join(&toggled),
                FindOptions::preferring(preferred).with_static(),
            ));
        }
        candidates.push(Candidate::new(
            toggled,
            FindOptions::preferring(preferred).with_static(),
        ));

        candidates.into_iter().flatten().unique().collect()
    }

    /// Resolves a partial reference made while rendering the page published at
    /// `current_destination`.
    #[instrument(skip(self))]
    pub fn resolve_partial(
        &self,
        reference: &str,
        current_destination: Option<&str>,
        hint: &FindOptions,
    ) -> Resolution {
        let current = current_destination
            .and_then(|path| self.sitemap.find_resource_by_destination_path(path));
        self.first_match(self.candidates(reference, current, hint))
    }

    /// Finds layout `name` in the layouts directory, then at the source root.
    #[instrument(skip(self))]
    pub fn locate_layout(&self, name: &str, preferred: Option<&EngineId>) -> Resolution {
        let name = match RelPath::new(strip_root(name)) {
            Ok(path) => path,
            Err(_) => return Resolution::NotFound { tried: vec![] },
        };
        let options = FindOptions::preferring(preferred);
        let candidates = [self.layouts_dir.join(&name), name]
            .into_iter()
            .filter_map(|path| Candidate::new(path, options.clone()))
            .unique()
            .collect();
        self.first_match(candidates)
    }

    fn first_match(&self, candidates: Vec<Candidate>) -> Resolution {
        let mut tried = vec![];
        for candidate in candidates {
            trace!(path = %candidate.path, options = ?candidate.options, "trying candidate");
            if let Some(file) = self.lookup.find(&candidate.path, &candidate.options) {
                let is_template = self.is_template(&file);
                return Resolution::Found { file, is_template };
            }
            let path = candidate.path.to_slash_string();
            if !tried.contains(&path) {
                tried.push(path);
            }
        }
        Resolution::NotFound { tried }
    }

    fn is_template(&self, file: &SourceFile) -> bool {
        self.sitemap
            .find_resource_by_source_path(file.relative_path())
            .map_or_else(
                || self.engines.engine_for_path(file.relative_path()).is_some(),
                Resource::is_template,
            )
    }
}

fn strip_root(reference: &str) -> &str {
    let mut reference = reference;
    loop {
        let stripped = reference.trim_start_matches('/');
        let stripped = stripped.strip_prefix("./").unwrap_or(stripped);
        if stripped == reference {
            return reference;
        }
        reference = stripped;
    }
}

/// `_nav` becomes `nav` and `nav` becomes `_nav`.
fn toggle_underscore(path: &RelPath) -> RelPath {
    match path.file_name().and_then(OsStr::to_str) {
        Some(name) => match name.strip_prefix('_') {
            Some("") => path.clone(),
            Some(stripped) => path.with_file_name(stripped),
            None => path.with_file_name(format!("_{}", name)),
        },
        None => path.clone(),
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;
    use crate::test::{abs, rel};
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Matches `path` against a fixed set of file paths, recording every query.
    #[derive(Default)]
    struct FakeLookup {
        files: HashSet<String>,
        queries: RefCell<Vec<(String, FindOptions)>>,
    }

    impl FakeLookup {
        fn with_files(files: &[&str]) -> Self {
            Self {
                files: files.iter().map(|f| (*f).to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    impl FileLookup for FakeLookup {
        fn find(&self, path: &RelPath, options: &FindOptions) -> Option<SourceFile> {
            let path = path.to_slash_string();
            self.queries.borrow_mut().push((path.clone(), options.clone()));
            let with_engine = format!("{}.tpl", path);
            [with_engine]
                .into_iter()
                .chain(options.try_static.then(|| path))
                .find(|candidate| self.files.contains(candidate))
                .map(|found| SourceFile::new(abs!("/site/source"), RelPath::from_relative(found)))
        }
    }

    fn sitemap_with_page(page: &str, engines: &Engines) -> Sitemap {
        let mut sitemap = Sitemap::new();
        let file = SourceFile::new(abs!("/site/source"), rel!(page).clone());
        sitemap.insert(Resource::from_source(file, engines, rel!("layouts")));
        sitemap
    }

    fn paths(candidates: &[Candidate]) -> Vec<String> {
        candidates.iter().map(|c| c.path.to_slash_string()).collect()
    }

    #[test]
    fn candidate_order_for_known_page() {
        let engines = Engines::with_defaults();
        let sitemap = sitemap_with_page("blog/index.tpl", &engines);
        let layouts = rel!("layouts").clone();
        let resolver = Resolver::new(FakeLookup::default(), &sitemap, &engines, &layouts);
        let page = sitemap
            .find_resource_by_destination_path("blog/index.html")
            .unwrap();

        let candidates = resolver.candidates("nav", Some(page), &FindOptions::default());
        assert_eq!(
            paths(&candidates),
            vec!["blog/nav", "nav", "nav", "blog/_nav", "_nav"]
        );
        assert_eq!(
            candidates[0].options.preferred_engine,
            Some(EngineId::from("tpl"))
        );
        assert!(!candidates[1].options.try_static);
        assert!(candidates[2].options.try_static);
        assert!(candidates[3].options.try_static);
        assert!(candidates[4].options.try_static);
    }

    #[test]
    fn unknown_page_skips_directory_candidates() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let resolver = Resolver::new(FakeLookup::default(), &sitemap, &engines, &layouts);

        let candidates = resolver.candidates("_nav", None, &FindOptions::default());
        assert_eq!(paths(&candidates), vec!["_nav", "_nav", "nav"]);
    }

    #[test]
    fn strips_root_markers() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let resolver = Resolver::new(FakeLookup::default(), &sitemap, &engines, &layouts);

        let candidates = resolver.candidates("/shared/_footer", None, &FindOptions::default());
        assert_eq!(candidates[0].path.to_slash_string(), "shared/_footer");
        let candidates = resolver.candidates("./shared/footer", None, &FindOptions::default());
        assert_eq!(candidates[0].path.to_slash_string(), "shared/footer");
    }

    #[test]
    fn escaping_references_produce_no_candidate() {
        let engines = Engines::with_defaults();
        let sitemap = sitemap_with_page("blog/index.tpl", &engines);
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["secret.tpl"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        let resolution = resolver.resolve_partial("../../secret", Some("blog/index.html"), &FindOptions::default());
        assert_eq!(resolution, Resolution::NotFound { tried: vec![] });
    }

    #[test]
    fn directory_match_beats_root_match() {
        let engines = Engines::with_defaults();
        let sitemap = sitemap_with_page("blog/index.tpl", &engines);
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["blog/_foo.tpl", "_foo.tpl"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        match resolver.resolve_partial("_foo", Some("blog/index.html"), &FindOptions::default()) {
            Resolution::Found { file, is_template } => {
                assert_eq!(file.relative_path(), rel!("blog/_foo.tpl"));
                assert!(is_template);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stops_at_first_match() {
        let engines = Engines::with_defaults();
        let sitemap = sitemap_with_page("blog/index.tpl", &engines);
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["nav.tpl", "blog/_nav.tpl"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        let resolution = resolver.resolve_partial("nav", Some("blog/index.html"), &FindOptions::default());
        assert!(matches!(resolution, Resolution::Found { .. }));
        let queried = resolver
            .lookup
            .queries
            .borrow()
            .iter()
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();
        assert_eq!(queried, vec!["blog/nav", "nav"]);
    }

    #[test]
    fn not_found_lists_tried_paths() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let resolver = Resolver::new(FakeLookup::default(), &sitemap, &engines, &layouts);

        assert_eq!(
            resolver.resolve_partial("missing", None, &FindOptions::default()),
            Resolution::NotFound {
                tried: vec!["missing".into(), "_missing".into()]
            }
        );
    }

    #[test]
    fn static_match_is_not_a_template() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["foo.png"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        match resolver.resolve_partial("foo.png", None, &FindOptions::default()) {
            Resolution::Found { file, is_template } => {
                assert_eq!(file.relative_path(), rel!("foo.png"));
                assert!(!is_template);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn layouts_dir_before_source_root() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["layouts/base.tpl", "base.tpl"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        match resolver.locate_layout("base", None) {
            Resolution::Found { file, .. } => {
                assert_eq!(file.relative_path(), rel!("layouts/base.tpl"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn layout_at_source_root() {
        let engines = Engines::with_defaults();
        let sitemap = Sitemap::new();
        let layouts = rel!("layouts").clone();
        let lookup = FakeLookup::with_files(&["base.tpl"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        assert!(matches!(
            resolver.locate_layout("base", None),
            Resolution::Found { .. }
        ));
        assert_eq!(
            resolver.locate_layout("other", None),
            Resolution::NotFound {
                tried: vec!["layouts/other".into(), "other".into()]
            }
        );
    }

    #[test]
    fn try_static_extends_to_directory_candidates() {
        let engines = Engines::with_defaults();
        let sitemap = sitemap_with_page("blog/index.tpl", &engines);
        let layouts = rel!("layouts").clone();
        let page = sitemap
            .find_resource_by_destination_path("blog/index.html")
            .unwrap();
        let lookup = FakeLookup::with_files(&["blog/logo.svg", "logo.svg"]);
        let resolver = Resolver::new(lookup, &sitemap, &engines, &layouts);

        let hint = FindOptions::default().with_static();
        let candidates = resolver.candidates("logo.svg", Some(page), &hint);
        assert_eq!(
            paths(&candidates),
            vec!["blog/logo.svg", "logo.svg", "blog/_logo.svg", "_logo.svg"]
        );
        assert!(candidates.iter().all(|c| c.options.try_static));
        assert_eq!(
            candidates[0].options.preferred_engine,
            Some(EngineId::from("tpl"))
        );

        match resolver.resolve_partial("logo.svg", Some("blog/index.html"), &hint) {
            Resolution::Found { file, is_template } => {
                assert_eq!(file.relative_path(), rel!("blog/logo.svg"));
                assert!(!is_template);
            }
            other => panic!("unexpected {:?}", other),
        }
        match resolver.resolve_partial("logo.svg", Some("blog/index.html"), &FindOptions::default()) {
            Resolution::Found { file, .. } => assert_eq!(file.relative_path(), rel!("logo.svg")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn toggles_underscore() {
        assert_eq!(toggle_underscore(rel!("a/_nav")), rel!("a/nav").clone());
        assert_eq!(toggle_underscore(rel!("nav")), rel!("_nav").clone());
        assert_eq!(toggle_underscore(rel!("_")), rel!("_").clone());
    }
}
