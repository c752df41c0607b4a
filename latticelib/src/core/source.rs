use serde::Serialize;
use std::ffi::OsStr;

use crate::{AbsPath, RelPath};

/// A template or asset in the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceFile {
    relative_path: RelPath,
    full_path: AbsPath,
}

impl SourceFile {
    pub fn new(source_dir: &AbsPath, relative_path: RelPath) -> Self {
        let full_path = source_dir.join(&relative_path);
        Self {
            relative_path,
            full_path,
        }
    }

    pub fn relative_path(&self) -> &RelPath {
        &self.relative_path
    }

    pub fn full_path(&self) -> &AbsPath {
        &self.full_path
    }

    pub fn exists(&self) -> bool {
        self.full_path.is_file()
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }

    /// Every dotted extension of the file name, in order: `index.html.md.tpl`
    /// yields `["html", "md", "tpl"]`.
    pub fn extensions(&self) -> Vec<&str> {
        split_extensions(self.file_name()).1
    }

    /// The final extension, which selects the template engine.
    pub fn extension(&self) -> Option<&str> {
        self.extensions().last().copied()
    }

    /// Reads the file, replacing invalid UTF-8 sequences.
    pub fn read(&self) -> std::io::Result<String> {
        let bytes = std::fs::read(self.full_path.as_path())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relative_path)
    }
}

/// Splits a file name into its stem and dotted extensions. A leading dot is
/// part of the stem.
pub fn split_extensions(name: &str) -> (&str, Vec<&str>) {
    let offset = usize::from(name.starts_with('.'));
    match name[offset..].find('.') {
        Some(idx) => {
            let (stem, rest) = name.split_at(idx + offset);
            (
                stem,
                rest[1..].split('.').filter(|ext| !ext.is_empty()).collect(),
            )
        }
        None => (name, vec![]),
    }
}

#[cfg(test)]
mod test {

    #![allow(warnings, unused)]
    use super::*;
    use crate::test::{abs, rel};

    #[test]
    fn splits_multiple_extensions() {
        assert_eq!(
            split_extensions("index.html.md.tpl"),
            ("index", vec!["html", "md", "tpl"])
        );
    }

    #[test]
    fn splits_without_extension() {
        assert_eq!(split_extensions("README"), ("README", vec![]));
    }

    #[test]
    fn dotfiles_keep_leading_dot() {
        assert_eq!(split_extensions(".htaccess"), (".htaccess", vec![]));
        assert_eq!(split_extensions(".env.tpl"), (".env", vec!["tpl"]));
    }

    #[test]
    fn builds_full_path() {
        let file = SourceFile::new(abs!("/site/source"), rel!("blog/_nav.tpl").clone());
        assert_eq!(file.full_path(), abs!("/site/source/blog/_nav.tpl"));
        assert_eq!(file.extension(), Some("tpl"));
        assert_eq!(file.file_name(), "_nav.tpl");
    }
}
