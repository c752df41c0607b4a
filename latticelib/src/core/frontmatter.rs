use eyre::{eyre, WrapErr};
use serde::{Deserialize, Serialize};

use crate::core::config::LayoutSetting;
use crate::render::Locals;
use crate::Result;

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FrontMatter {
    pub layout: Option<LayoutSetting>,
    pub locals: Locals,
}

/// Splits a template into its `+++` delimited TOML front matter and body.
/// Templates without front matter get the default front matter and the whole
/// document as the body.
pub fn split_document(raw: &str) -> Result<(FrontMatter, &str)> {
    let re = crate::util::static_regex!(
        r"(?m)\A\s*\+\+\+[ \t]*\r?\n((?s:.*?))^[ \t]*\+\+\+[ \t]*(?:\r?\n|\z)((?s:.*))"
    );
    match re.captures(raw)? {
        Some(captures) => {
            let raw_frontmatter = captures
                .get(1)
                .map(|m| m.as_str())
                .ok_or_else(|| eyre!("unable to read frontmatter"))?;
            let body = captures.get(2).map_or("", |m| m.as_str());
            let frontmatter: FrontMatter = toml::from_str(raw_frontmatter)
                .wrap_err_with(|| String::from("failed parsing frontmatter into TOML"))?;
            Ok((frontmatter, body))
        }
        None => Ok((FrontMatter::default(), raw)),
    }
}
