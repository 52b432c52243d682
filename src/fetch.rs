use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{FlipbookError, FlipbookResult};
use crate::source::Source;

/// Host-bundled resource store consulted for [`Source::Asset`] fetches.
pub trait AssetBundle: Send + Sync {
    /// Read the raw bytes of a bundled resource by name.
    ///
    /// Fails with [`FlipbookError::NotFound`] when the bundle has no such
    /// entry.
    fn load(&self, name: &str) -> FlipbookResult<Vec<u8>>;
}

/// Directory-backed [`AssetBundle`].
#[derive(Clone, Debug)]
pub struct DirBundle {
    root: PathBuf,
}

impl DirBundle {
    /// Bundle rooted at `root`; asset names resolve relative to it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetBundle for DirBundle {
    fn load(&self, name: &str) -> FlipbookResult<Vec<u8>> {
        let rel = normalize_asset_name(name)?;
        let path = self.root.join(rel);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FlipbookError::not_found(name.to_owned())
            } else {
                FlipbookError::Io(e)
            }
        })
    }
}

/// In-memory [`AssetBundle`], useful for embedded resources and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticBundle {
    entries: HashMap<String, Vec<u8>>,
}

impl StaticBundle {
    /// Empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }
}

impl AssetBundle for StaticBundle {
    fn load(&self, name: &str) -> FlipbookResult<Vec<u8>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| FlipbookError::not_found(name.to_owned()))
    }
}

/// Normalize and validate bundle-relative asset names.
///
/// The normalized result uses `/` separators, removes `.` segments, and
/// rejects absolute paths or parent traversals (`..`).
pub fn normalize_asset_name(name: &str) -> FlipbookResult<String> {
    let s = name.replace('\\', "/");
    if s.starts_with('/') {
        return Err(FlipbookError::validation("asset names must be relative"));
    }
    if s.is_empty() {
        return Err(FlipbookError::validation("asset name must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(FlipbookError::validation(
                "asset names must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(FlipbookError::validation(
            "asset name must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Obtains raw encoded bytes for every [`Source`] variant.
///
/// Network fetches share one HTTP client built with automatic response
/// decompression disabled: the body bytes are the encoded image container
/// verbatim, and transparent decompression of an already-compressed
/// container corrupts them. Errors propagate unretried.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    bundle: Option<Arc<dyn AssetBundle>>,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    /// Fetcher with the shared client configuration and no asset bundle.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .no_gzip()
            .no_brotli()
            .no_deflate()
            .no_zstd()
            .build()
            .expect("default HTTP client construction failed (no TLS backend available)");
        Self { http, bundle: None }
    }

    /// Fetcher that resolves [`Source::Asset`] through `bundle`.
    pub fn with_bundle(bundle: Arc<dyn AssetBundle>) -> Self {
        let mut fetcher = Self::new();
        fetcher.bundle = Some(bundle);
        fetcher
    }

    /// Replace the HTTP client, keeping any configured bundle.
    pub fn with_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Fetch the encoded bytes for `source`.
    pub async fn fetch(&self, source: &Source) -> FlipbookResult<Vec<u8>> {
        match source {
            Source::Network { url, headers } => self.fetch_network(url, headers).await,
            Source::Asset { name } => match &self.bundle {
                Some(bundle) => bundle.load(name),
                None => Err(FlipbookError::not_found(format!(
                    "no asset bundle configured, cannot resolve '{name}'"
                ))),
            },
            Source::File(path) => Ok(tokio::fs::read(path).await?),
            Source::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    async fn fetch_network(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> FlipbookResult<Vec<u8>> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FlipbookError::network(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlipbookError::network(format!("GET {url}: status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FlipbookError::network(format!("read body of {url}: {e}")))?;
        tracing::debug!(url, bytes = body.len(), "fetched network source");
        Ok(body.to_vec())
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("bundle", &self.bundle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_asset_name_cross_platform() {
        assert_eq!(normalize_asset_name("a/b.gif").unwrap(), "a/b.gif");
        assert_eq!(normalize_asset_name("a\\b.gif").unwrap(), "a/b.gif");
        assert_eq!(normalize_asset_name("./a/./b.gif").unwrap(), "a/b.gif");
        assert!(normalize_asset_name("../x.gif").is_err());
        assert!(normalize_asset_name("/abs.gif").is_err());
        assert!(normalize_asset_name("").is_err());
    }

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "flipbook_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn dir_bundle_reads_relative_names_only() {
        let tmp = temp_dir("dir_bundle");
        std::fs::create_dir_all(tmp.join("anim")).unwrap();
        std::fs::write(tmp.join("anim/a.gif"), [1u8, 2, 3]).unwrap();

        let bundle = DirBundle::new(&tmp);
        assert_eq!(bundle.load("anim/a.gif").unwrap(), vec![1, 2, 3]);
        assert_eq!(bundle.load("anim\\a.gif").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            bundle.load("anim/missing.gif").unwrap_err(),
            FlipbookError::NotFound(_)
        ));
        assert!(matches!(
            bundle.load("../outside.gif").unwrap_err(),
            FlipbookError::Validation(_)
        ));

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn static_bundle_loads_and_misses() {
        let mut bundle = StaticBundle::new();
        bundle.insert("a.gif", vec![1, 2, 3]);

        assert_eq!(bundle.load("a.gif").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            bundle.load("b.gif").unwrap_err(),
            FlipbookError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn memory_source_is_passthrough() {
        let fetcher = Fetcher::new();
        let bytes = fetcher
            .fetch(&Source::memory(vec![7, 8, 9]))
            .await
            .unwrap();
        assert_eq!(bytes, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn missing_file_maps_to_io_error() {
        let fetcher = Fetcher::new();
        let err = fetcher
            .fetch(&Source::file("/nonexistent/flipbook/x.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlipbookError::Io(_)));
    }

    #[tokio::test]
    async fn asset_without_bundle_is_not_found() {
        let fetcher = Fetcher::new();
        let err = fetcher.fetch(&Source::asset("a.gif")).await.unwrap_err();
        assert!(matches!(err, FlipbookError::NotFound(_)));
    }
}
