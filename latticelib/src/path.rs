use derivative::Derivative;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::Result;
use eyre::{eyre, WrapErr};
use serde::Serialize;

macro_rules! impl_try_from {
    ($src:ty => $target:ident) => {
        impl TryFrom<$src> for $target {
            type Error = eyre::Report;
            fn try_from(path: $src) -> Result<Self> {
                Self::new(path)
            }
        }
    };
}

#[derive(Derivative, Serialize)]
#[derivative(Debug, Clone, Hash, PartialEq)]
pub struct RelPath(PathBuf);

impl RelPath {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if path.has_root() {
            return Err(eyre!(
                "relative path must not have a root component: '{}'",
                path.display()
            ));
        }
        Ok(Self(path))
    }

    pub fn from_relative<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        assert!(!path.has_root());
        Self(path)
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    pub fn display(&self) -> std::path::Display {
        self.0.display()
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    pub fn extension(&self) -> Option<&OsStr> {
        self.0.extension()
    }

    pub fn starts_with<P: AsRef<Path>>(&self, base: P) -> bool {
        self.0.starts_with(base)
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// The containing directory. Empty for files at the root.
    #[must_use]
    pub fn parent(&self) -> Self {
        Self(self.0.parent().map(Path::to_path_buf).unwrap_or_default())
    }

    #[must_use]
    pub fn join(&self, path: &RelPath) -> Self {
        RelPath(self.0.join(&path.0))
    }

    #[must_use]
    pub fn with_file_name<S: AsRef<OsStr>>(&self, name: S) -> Self {
        let mut path = self.0.clone();
        path.set_file_name(name);
        Self(path)
    }

    /// Appends `.ext` to the file name, keeping any existing extensions.
    #[must_use]
    pub fn with_appended_extension<S: AsRef<str>>(&self, ext: S) -> Self {
        let mut name = self.file_name().map(OsStr::to_os_string).unwrap_or_default();
        name.push(".");
        name.push(ext.as_ref());
        self.with_file_name(name)
    }

    /// Lexically resolves `.` and `..` components. Returns `None` when the path
    /// climbs above its root.
    pub fn normalize(&self) -> Option<Self> {
        let mut normalized = PathBuf::new();
        for component in self.0.components() {
            match component {
                Component::CurDir => (),
                Component::ParentDir => {
                    if !normalized.pop() {
                        return None;
                    }
                }
                Component::Normal(part) => normalized.push(part),
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(Self(normalized))
    }

    /// Slash-separated form, used as a lookup key.
    pub fn to_slash_string(&self) -> String {
        self.0
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl Eq for RelPath {}

impl AsRef<Path> for RelPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl_try_from!(OsString => RelPath);
impl_try_from!(&OsStr => RelPath);
impl_try_from!(&str => RelPath);
impl_try_from!(String => RelPath);
impl_try_from!(&Path => RelPath);
impl_try_from!(PathBuf => RelPath);

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.display(), f)
    }
}

#[derive(Derivative, Serialize)]
#[derivative(Debug, Clone, Hash, PartialEq)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if !path.has_root() {
            return Err(eyre!(
                "absolute path must have a root component: '{}'",
                path.display()
            ));
        }
        Ok(Self(path))
    }

    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    pub fn display(&self) -> std::path::Display {
        self.0.display()
    }

    #[must_use]
    pub fn join(&self, path: &RelPath) -> Self {
        Self(self.0.join(path.as_path()))
    }

    pub fn strip_prefix(&self, base: &AbsPath) -> Result<RelPath> {
        self.0
            .strip_prefix(base.as_path())
            .map(|path| RelPath(path.to_path_buf()))
            .wrap_err_with(|| {
                format!(
                    "Failed stripping prefix from abs path. Base '{}' doesn't exist on abs path '{}'",
                    base, self
                )
            })
    }

    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    pub fn is_file(&self) -> bool {
        self.0.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }
}

impl Eq for AbsPath {}

impl AsRef<Path> for AbsPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl_try_from!(&str => AbsPath);
impl_try_from!(&Path => AbsPath);
impl_try_from!(PathBuf => AbsPath);

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.display(), f)
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]

    use super::*;
    use crate::test::{abs, rel};

    #[test]
    fn make_new_rel_fails_with_absolute_path() {
        assert!(RelPath::new("/test").is_err());
    }

    #[test]
    fn make_new_abs_fails_with_relative_path() {
        assert!(AbsPath::new("test").is_err());
    }

    #[test]
    fn parent_of_root_file_is_empty() {
        assert!(rel!("index.html.tpl").parent().is_empty());
        assert_eq!(rel!("a/b/c.tpl").parent(), *rel!("a/b"));
    }

    #[test]
    fn normalizes_parent_components() {
        let path = rel!("blog/../shared/./nav").normalize().unwrap();
        assert_eq!(path, *rel!("shared/nav"));
    }

    #[test]
    fn normalize_rejects_escaping_root() {
        assert!(rel!("../outside").normalize().is_none());
    }

    #[test]
    fn appends_extension() {
        let path = rel!("partials/nav.html").with_appended_extension("tpl");
        assert_eq!(path, *rel!("partials/nav.html.tpl"));
    }

    #[test]
    fn slash_string() {
        assert_eq!(rel!("a/b/c").to_slash_string(), "a/b/c");
        assert_eq!(rel!("").to_slash_string(), "");
    }

    #[test]
    fn strips_abs_prefix() {
        let path = abs!("/project/source/index.tpl");
        let rel = path.strip_prefix(abs!("/project/source")).unwrap();
        assert_eq!(rel, *rel!("index.tpl"));
    }
}
