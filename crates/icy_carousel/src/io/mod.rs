use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::error::{LoadError, LoadResult};

mod fetch;
pub use fetch::*;

/// Where a local reference points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalPath {
    /// Bundled resource (`qrc:/` or `:/`), relative to the resource root
    Resource(String),
    File(PathBuf),
}

/// Classified image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Local(LocalPath),
    Remote(Url),
    Unsupported(String),
}

impl SourceRef {
    pub fn classify(reference: &str) -> SourceRef {
        let reference = reference.trim();
        if reference.is_empty() {
            return SourceRef::Unsupported(String::new());
        }

        if let Some(rest) = reference.strip_prefix("qrc:/").or_else(|| reference.strip_prefix(":/")) {
            return SourceRef::Local(LocalPath::Resource(rest.trim_start_matches('/').to_string()));
        }
        if let Some(rest) = reference.strip_prefix("file://") {
            return SourceRef::Local(LocalPath::File(PathBuf::from(rest)));
        }

        // protocol relative
        let absolute;
        let url_text = if reference.starts_with("//") {
            absolute = format!("https:{reference}");
            absolute.as_str()
        } else {
            reference
        };

        let lower = url_text.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return match Url::parse(url_text) {
                Ok(url) if url.host_str().is_some() => SourceRef::Remote(url),
                _ => SourceRef::Unsupported(reference.to_string()),
            };
        }

        if reference.contains("://") || lower.starts_with("data:") {
            return SourceRef::Unsupported(reference.to_string());
        }

        SourceRef::Local(LocalPath::File(PathBuf::from(reference)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Remote(_))
    }
}

/// Synchronous byte access for local references.
pub trait ByteSource: Send + Sync {
    fn read(&self, reference: &str) -> LoadResult<Vec<u8>>;
}

/// Reads files from disk; resource references resolve against `root`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &LocalPath) -> PathBuf {
        match path {
            LocalPath::Resource(rel) => self.root.join(rel),
            LocalPath::File(path) => path.clone(),
        }
    }
}

impl ByteSource for LocalStore {
    fn read(&self, reference: &str) -> LoadResult<Vec<u8>> {
        match SourceRef::classify(reference) {
            SourceRef::Local(local) => {
                let path = self.resolve(&local);
                std::fs::read(&path).map_err(|err| LoadError::io(path, &err))
            }
            _ => Err(LoadError::UnsupportedReference(reference.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_local_references() {
        assert_eq!(SourceRef::classify("qrc:/data/a.png"), SourceRef::Local(LocalPath::Resource("data/a.png".into())));
        assert_eq!(SourceRef::classify(":/data/a.png"), SourceRef::Local(LocalPath::Resource("data/a.png".into())));
        assert_eq!(SourceRef::classify("file:///tmp/a.png"), SourceRef::Local(LocalPath::File("/tmp/a.png".into())));
        assert_eq!(SourceRef::classify("images/a.png"), SourceRef::Local(LocalPath::File("images/a.png".into())));
    }

    #[test]
    fn classifies_remote_references() {
        let SourceRef::Remote(url) = SourceRef::classify("//cdn.example.com/p.jpg") else {
            panic!("expected remote");
        };
        assert_eq!(url.as_str(), "https://cdn.example.com/p.jpg");
        assert!(SourceRef::classify("http://example.com/x.webp").is_remote());
    }

    #[test]
    fn rejects_unknown_schemes() {
        assert!(matches!(SourceRef::classify(""), SourceRef::Unsupported(_)));
        assert!(matches!(SourceRef::classify("ftp://example.com/a.png"), SourceRef::Unsupported(_)));
        assert!(matches!(SourceRef::classify("http://"), SourceRef::Unsupported(_)));
        assert!(matches!(SourceRef::classify("data:image/png;base64,AAAA"), SourceRef::Unsupported(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = LocalStore::new("/nonexistent-root");
        assert!(matches!(store.read(":/nope.png"), Err(LoadError::Io { .. })));
        assert!(matches!(store.read("https://example.com/a.png"), Err(LoadError::UnsupportedReference(_))));
    }
}
