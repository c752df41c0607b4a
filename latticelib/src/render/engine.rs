mod directive;
mod markdown;
mod tera;

pub use self::tera::TeraEngine;
pub use directive::DirectiveEngine;
pub use markdown::MarkdownEngine;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::render::{Block, Locals, RenderContext};
use crate::Result;

/// Identifies a template engine by the file extension it is registered for.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
pub struct EngineId(String);

impl EngineId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The engine implied by the final extension of `path`, registered or not.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::new)
    }
}

impl AsRef<str> for EngineId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for EngineId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for EngineId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EngineId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A template syntax evaluator.
///
/// Engines write their output through [`RenderContext::emit`] so that helpers
/// called mid-template (layout wraps, partials) land at the right position.
/// `block` is the content the caller handed in, usually the body a layout wraps.
pub trait TemplateEngine: Send + Sync {
    fn render<'a>(
        &self,
        source: &str,
        ctx: &mut RenderContext<'a>,
        locals: &Locals,
        block: Option<&mut Block<'_, 'a>>,
    ) -> Result<()>;
}

/// Extension → engine table. Declaration order is the lookup order used when
/// several engines could serve the same file.
#[derive(Default)]
pub struct Engines {
    engines: Vec<(EngineId, Box<dyn TemplateEngine>)>,
}

impl Engines {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tpl` (directive), `tera` and `md`, in that order.
    pub fn with_defaults() -> Self {
        let mut engines = Self::new();
        engines.register("tpl", DirectiveEngine::new());
        engines.register("tera", TeraEngine::new());
        engines.register("md", MarkdownEngine::new());
        engines
    }

    /// Registers `engine` for `id`, replacing any existing engine in place.
    pub fn register<I, E>(&mut self, id: I, engine: E) -> &mut Self
    where
        I: Into<EngineId>,
        E: TemplateEngine + 'static,
    {
        let id = id.into();
        let engine: Box<dyn TemplateEngine> = Box::new(engine);
        match self.engines.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = engine,
            None => self.engines.push((id, engine)),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&dyn TemplateEngine> {
        self.engines
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, engine)| engine.as_ref())
    }

    pub fn has_engine_for(&self, ext: &str) -> bool {
        self.get(ext).is_some()
    }

    /// The registered engine for the final extension of `path`.
    pub fn engine_for_path<P: AsRef<Path>>(&self, path: P) -> Option<EngineId> {
        EngineId::from_path(path).filter(|id| self.has_engine_for(id.as_str()))
    }

    /// Position in declaration order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.engines.iter().position(|(existing, _)| existing == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &EngineId> {
        self.engines.iter().map(|(id, _)| id)
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;

    #[test]
    fn defaults_keep_declaration_order() {
        let engines = Engines::with_defaults();
        let ids = engines.ids().map(EngineId::as_str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["tpl", "tera", "md"]);
    }

    #[test]
    fn replaces_engine_in_place() {
        let mut engines = Engines::with_defaults();
        engines.register("tpl", MarkdownEngine::new());
        assert_eq!(engines.position("tpl"), Some(0));
        assert_eq!(engines.ids().count(), 3);
    }

    #[test]
    fn engine_for_path_requires_registration() {
        let engines = Engines::with_defaults();
        assert_eq!(
            engines.engine_for_path("index.html.tpl"),
            Some(EngineId::from("tpl"))
        );
        assert_eq!(engines.engine_for_path("logo.png"), None);
        assert!(engines.has_engine_for("md"));
        assert!(!engines.has_engine_for("html"));
    }

    #[test]
    fn engine_id_from_path() {
        assert_eq!(EngineId::from_path("a/b.erb"), Some(EngineId::from("erb")));
        assert_eq!(EngineId::from_path("README"), None);
    }
}
