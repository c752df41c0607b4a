use eyre::WrapErr;
use std::fs;
use std::path::Path;
use tracing::instrument;

use crate::{AbsPath, Result};

#[macro_export]
macro_rules! static_regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::OnceCell<fancy_regex::Regex> = once_cell::sync::OnceCell::new();
        RE.get_or_init(|| {
            fancy_regex::Regex::new($re)
                .expect(&format!("Malformed regex '{}'. This is a bug.", $re))
        })
    }};
}

pub(crate) use static_regex;

#[instrument(skip(condition), ret)]
pub fn get_all_paths<P: AsRef<Path> + std::fmt::Debug>(
    root: P,
    condition: &dyn Fn(&Path) -> bool,
) -> Result<Vec<AbsPath>> {
    let root = root.as_ref();
    let mut paths = vec![];
    if root.is_dir() {
        for entry in fs::read_dir(root)
            .wrap_err_with(|| format!("Failed to read directory '{}'", root.display()))?
        {
            let path = entry
                .wrap_err_with(|| {
                    format!("Failed to read directory entry in '{}'", root.display())
                })?
                .path();
            if path.is_dir() {
                paths.append(&mut get_all_paths(&path, condition).wrap_err_with(|| {
                    format!("Failed to get all paths from '{}'", path.display())
                })?);
            } else if condition(path.as_ref()) {
                paths.push(AbsPath::new(&path).wrap_err_with(|| {
                    format!("Failed to convert '{}' to absolute path", path.display())
                })?);
            }
        }
    }
    Ok(paths)
}

#[derive(Debug, Clone)]
pub struct Glob {
    glob: globset::Glob,
    matcher: globset::GlobMatcher,
}

impl Glob {
    pub fn is_match<P: AsRef<Path>>(&self, path: P) -> bool {
        self.matcher.is_match(path)
    }

    pub fn glob(&self) -> &str {
        self.glob.glob()
    }
}

impl TryFrom<String> for Glob {
    type Error = globset::Error;

    fn try_from(s: String) -> std::result::Result<Glob, Self::Error> {
        s.as_str().try_into()
    }
}

impl TryFrom<&str> for Glob {
    type Error = globset::Error;

    #[instrument(ret)]
    fn try_from(s: &str) -> std::result::Result<Glob, Self::Error> {
        let glob = globset::GlobBuilder::new(s)
            .literal_separator(true)
            .build()?;
        let matcher = glob.compile_matcher();
        Ok(Self { glob, matcher })
    }
}

/// Compiles a list of glob patterns, failing on the first malformed one.
pub fn compile_globs<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Glob>> {
    patterns
        .iter()
        .map(|pattern| {
            Glob::try_from(pattern.as_ref())
                .wrap_err_with(|| format!("Malformed glob pattern '{}'", pattern.as_ref()))
        })
        .collect()
}
