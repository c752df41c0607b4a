use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::LayoutSetting;
use crate::render::EngineId;

/// Template-local bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locals(Map<String, Value>);

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows a dotted path through nested objects.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |value, key| value.get(key))
    }

    /// Returns a copy of `self` with `overrides` layered on top.
    #[must_use]
    pub fn merged(&self, overrides: &Locals) -> Self {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Locals {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Locals {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Options for a single render. `locals` is reserved: partial renders split it
/// off and hand it to the template as its bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub locals: Locals,
    pub preferred_engine: Option<EngineId>,
    pub try_static: bool,
    pub layout: Option<LayoutSetting>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn with_locals(mut self, locals: Locals) -> Self {
        self.locals = locals;
        self
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutSetting) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Separates the reserved `locals` key from the remaining options.
    pub fn split_locals(mut self) -> (Locals, RenderOptions) {
        let locals = std::mem::take(&mut self.locals);
        (locals, self)
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;
    use serde_json::json;

    #[test]
    fn merged_prefers_overrides() {
        let base = Locals::new().with("title", "base").with("lang", "en");
        let merged = base.merged(&Locals::new().with("title", "page"));
        assert_eq!(merged.get("title"), Some(&json!("page")));
        assert_eq!(merged.get("lang"), Some(&json!("en")));
    }

    #[test]
    fn looks_up_nested_values() {
        let locals = Locals::new().with("page", json!({"meta": {"title": "Hi"}}));
        assert_eq!(locals.lookup(&["page", "meta", "title"]), Some(&json!("Hi")));
        assert_eq!(locals.lookup(&["page", "missing"]), None);
        assert_eq!(locals.lookup(&[]), None);
    }

    #[test]
    fn splits_reserved_locals_key() {
        let options = RenderOptions::from_value(json!({
            "locals": {"title": "Nav"},
            "try_static": true,
            "custom": 1,
        }))
        .unwrap();

        let (locals, options) = options.split_locals();
        assert_eq!(locals.get("title"), Some(&json!("Nav")));
        assert!(options.locals.is_empty());
        assert!(options.try_static);
        assert_eq!(options.extra.get("custom"), Some(&json!(1)));
    }

    #[test]
    fn parses_layout_option() {
        let options = RenderOptions::from_value(json!({"layout": false})).unwrap();
        assert_eq!(options.layout, Some(LayoutSetting::Toggle(false)));
    }
}
