use std::path::{Component, Path, PathBuf};

use xxhash_rust::xxh3::xxh3_128;

/// Where the encoded image bytes come from.
///
/// A source is immutable once constructed. It is used for exactly two things:
/// deriving a [`SourceKey`] for cache lookups and driving the byte fetch.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Source {
    /// HTTP(S) URL fetched with a GET request plus optional headers.
    Network {
        /// Absolute request URL.
        url: String,
        /// Header name/value pairs sent with the request.
        headers: Vec<(String, String)>,
    },
    /// Named entry in the host's bundled-resource store.
    Asset {
        /// Bundle-relative resource name.
        name: String,
    },
    /// Image file on the local filesystem.
    File(PathBuf),
    /// Already-loaded encoded bytes, no I/O involved.
    Memory(Vec<u8>),
}

impl Source {
    /// Network source without extra request headers.
    pub fn network(url: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Network source with request headers.
    pub fn network_with_headers(
        url: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self::Network {
            url: url.into(),
            headers,
        }
    }

    /// Bundled-asset source.
    pub fn asset(name: impl Into<String>) -> Self {
        Self::Asset { name: name.into() }
    }

    /// Filesystem source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// In-memory source.
    pub fn memory(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Memory(bytes.into())
    }

    /// Derive the deterministic cache key for this source.
    ///
    /// Pure and infallible: every variant produces a key. Keys are namespaced
    /// per variant so a URL can never collide with an asset name. File paths
    /// are normalized lexically (no filesystem access); memory buffers key on
    /// an xxh3-128 content hash rather than the bytes themselves.
    pub fn cache_key(&self) -> SourceKey {
        match self {
            Self::Network { url, .. } => SourceKey(format!("net:{url}")),
            Self::Asset { name } => SourceKey(format!("asset:{name}")),
            Self::File(path) => SourceKey(format!("file:{}", normalize_path(path))),
            Self::Memory(bytes) => SourceKey(format!("mem:{:032x}", xxh3_128(bytes))),
        }
    }
}

/// String uniquely identifying a [`Source`] for cache lookup purposes.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct SourceKey(String);

impl SourceKey {
    /// Access the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexical path normalization: `.` segments dropped, `..` pops where it can,
/// separators unified to `/`. Deliberately does not touch the filesystem so
/// key derivation stays pure.
fn normalize_path(path: &Path) -> String {
    let mut prefix = String::new();
    let mut parts = Vec::<String>::new();

    for comp in path.components() {
        match comp {
            Component::Prefix(p) => {
                prefix = p.as_os_str().to_string_lossy().into_owned();
            }
            Component::RootDir => {
                prefix.push('/');
                parts.clear();
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else if prefix.is_empty() {
                    parts.push("..".to_owned());
                }
            }
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
        }
    }

    format!("{prefix}{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_key() {
        assert_eq!(
            Source::network("https://example.com/a.gif").cache_key().as_str(),
            "net:https://example.com/a.gif"
        );
        assert_eq!(Source::asset("spin.gif").cache_key().as_str(), "asset:spin.gif");
        assert!(Source::file("/tmp/a.gif").cache_key().as_str().starts_with("file:"));
        assert!(Source::memory(vec![1, 2, 3]).cache_key().as_str().starts_with("mem:"));
    }

    #[test]
    fn file_keys_normalize_lexically() {
        let a = Source::file("/tmp/./x/../a.gif").cache_key();
        let b = Source::file("/tmp/a.gif").cache_key();
        assert_eq!(a, b);

        let rel = Source::file("../a.gif").cache_key();
        assert_eq!(rel.as_str(), "file:../a.gif");
    }

    #[test]
    fn memory_keys_are_content_addressed() {
        let a = Source::memory(vec![1, 2, 3]).cache_key();
        let b = Source::memory(vec![1, 2, 3]).cache_key();
        let c = Source::memory(vec![1, 2, 4]).cache_key();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn variants_never_collide() {
        let url = Source::network("a.gif").cache_key();
        let asset = Source::asset("a.gif").cache_key();
        let file = Source::file("a.gif").cache_key();
        assert_ne!(url, asset);
        assert_ne!(asset, file);
    }

    #[test]
    fn sources_round_trip_through_json() {
        let source = Source::network_with_headers(
            "https://example.com/a.gif",
            vec![("accept".to_owned(), "image/gif".to_owned())],
        );
        let json = serde_json::to_string(&source).unwrap();
        let back: Source = serde_json::from_str(&json).unwrap();
        assert_eq!(source, back);
        assert_eq!(source.cache_key(), back.cache_key());
    }

    #[test]
    fn headers_do_not_change_identity() {
        let plain = Source::network("https://example.com/a.gif").cache_key();
        let with_headers = Source::network_with_headers(
            "https://example.com/a.gif",
            vec![("authorization".to_owned(), "Bearer t".to_owned())],
        )
        .cache_key();
        assert_eq!(plain, with_headers);
    }
}
