//! Filesystem-backed icon cache keyed by sanitized domain and size
//!
//! Layout is a single flat directory. File names are
//! `{domain_with_dots_as_underscores}[_{size}].{ext}`; sized variants are
//! always PNG. Files are immutable once written and the existence check is
//! the idempotency guard. Writes go through a temp file and a rename, so a
//! concurrent duplicate write is a harmless overwrite with identical content.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::errors::{FaviconError, FaviconResult};
use crate::favicon::decoder::normalize_extension;
use crate::utils::url::UrlUtils;

/// Standard cascade sizes, largest first
pub const CASCADE_SIZES: [u32; 5] = [256, 128, 64, 32, 16];

/// Extensions an un-sized original may carry
pub const CACHE_EXTENSIONS: [&str; 7] = ["png", "jpg", "gif", "svg", "ico", "webp", "bmp"];

/// Whether a cached file was produced by this call or already present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Written(PathBuf),
    Existing(PathBuf),
}

impl StoreOutcome {
    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Written(p) | Self::Existing(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomainCache {
    root: PathBuf,
}

impl DomainCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> FaviconResult<()> {
        if !fs::try_exists(&self.root).await.unwrap_or(false) {
            fs::create_dir_all(&self.root).await?;
            info!("Created favicon cache directory: {}", self.root.display());
        }
        Ok(())
    }

    /// Normalize a domain (or URL) into a filesystem-safe key component
    ///
    /// Lowercases, strips `http://`/`https://`, drops anything from the first
    /// `/`, `?` or `#`, and replaces characters outside `[a-z0-9.-]` with `_`.
    pub fn sanitize(domain: &str) -> String {
        let lower = domain.trim().to_ascii_lowercase();
        let without_scheme = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"))
            .unwrap_or(&lower);
        let host = without_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();

        host.chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// File name stem shared by every file of a domain
    pub fn cache_key(domain: &str) -> FaviconResult<String> {
        let sanitized = Self::sanitize(domain);
        if sanitized.trim_matches(['.', '_', '-']).is_empty() {
            return Err(FaviconError::invalid_input(format!(
                "domain '{domain}' has no usable characters"
            )));
        }
        Ok(sanitized.replace('.', "_"))
    }

    pub fn file_name(domain: &str, size: Option<u32>, extension: &str) -> FaviconResult<String> {
        let key = Self::cache_key(domain)?;
        let ext = normalize_extension(extension).unwrap_or("png");
        Ok(match size {
            Some(size) => format!("{key}_{size}.png"),
            None => format!("{key}.{ext}"),
        })
    }

    /// Extension for an un-sized original, taken from the source URL path
    pub fn extension_from_url(source_url: &str) -> &'static str {
        UrlUtils::path_extension(source_url)
            .and_then(|ext| normalize_extension(&ext))
            .unwrap_or("png")
    }

    pub fn path_for(&self, domain: &str, size: Option<u32>, extension: &str) -> FaviconResult<PathBuf> {
        Ok(self.root.join(Self::file_name(domain, size, extension)?))
    }

    async fn existing(&self, path: PathBuf) -> Option<PathBuf> {
        match fs::try_exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                warn!("Failed to check cached icon {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn lookup_exact_size(&self, domain: &str, size: u32) -> Option<PathBuf> {
        let path = self.path_for(domain, Some(size), "png").ok()?;
        self.existing(path).await
    }

    /// Un-sized original in whichever extension it was stored with
    pub async fn lookup_original(&self, domain: &str) -> Option<PathBuf> {
        for ext in CACHE_EXTENSIONS {
            let path = self.path_for(domain, None, ext).ok()?;
            if let Some(found) = self.existing(path).await {
                return Some(found);
            }
        }
        None
    }

    /// Largest cached size, falling back to the un-sized original
    pub async fn lookup_any_size(&self, domain: &str) -> Option<PathBuf> {
        for size in CASCADE_SIZES {
            if let Some(found) = self.lookup_exact_size(domain, size).await {
                return Some(found);
            }
        }
        self.lookup_original(domain).await
    }

    /// Smallest cached size at least `size`, else the largest smaller one,
    /// else the original
    pub async fn lookup_closest(&self, domain: &str, size: u32) -> Option<PathBuf> {
        let mut cached = Vec::new();
        for candidate in CASCADE_SIZES {
            if self.lookup_exact_size(domain, candidate).await.is_some() {
                cached.push(candidate);
            }
        }

        let pick = cached
            .iter()
            .copied()
            .filter(|s| *s >= size)
            .min()
            .or_else(|| cached.iter().copied().max());

        match pick {
            Some(s) => self.lookup_exact_size(domain, s).await,
            None => self.lookup_original(domain).await,
        }
    }

    /// Write `bytes` unless the file already exists
    pub async fn store(
        &self,
        domain: &str,
        size: Option<u32>,
        extension: &str,
        bytes: &[u8],
    ) -> FaviconResult<StoreOutcome> {
        let path = self.path_for(domain, size, extension)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Cached icon already present: {}", path.display());
            return Ok(StoreOutcome::Existing(path));
        }

        self.ensure_dir().await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp_path = self
            .root
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        fs::write(&tmp_path, bytes).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!("Cached icon written: {} ({} bytes)", path.display(), bytes.len());
        Ok(StoreOutcome::Written(path))
    }

    /// Remove every file belonging to the host of `url`
    pub async fn clear_url(&self, url: &str) -> FaviconResult<usize> {
        let domain = UrlUtils::extract_domain(url)
            .ok_or_else(|| FaviconError::invalid_input(format!("cannot derive a domain from '{url}'")))?;
        self.clear_domain(&domain).await
    }

    pub async fn clear_domain(&self, domain: &str) -> FaviconResult<usize> {
        let key = Self::cache_key(domain)?;
        let removed = self.remove_matching(|name| belongs_to(&key, name)).await?;
        info!("Cleared {} cached icons for {}", removed, domain);
        Ok(removed)
    }

    pub async fn clear_all(&self) -> FaviconResult<usize> {
        let removed = self.remove_matching(|_| true).await?;
        info!("Cleared all {} cached icons", removed);
        Ok(removed)
    }

    async fn remove_matching<F>(&self, matches: F) -> FaviconResult<usize>
    where
        F: Fn(&str) -> bool,
    {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !matches(&name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove cached icon {}: {}", name, e),
            }
        }
        Ok(removed)
    }

    /// `Content-Type` for a cached file, from its extension
    pub fn content_type_for(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "bmp" => "image/bmp",
            _ => "application/octet-stream",
        }
    }
}

/// `{key}.{ext}` or `{key}_{size}.png` for one of the cascade sizes
fn belongs_to(key: &str, file_name: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(key) else {
        return false;
    };
    if let Some(ext) = rest.strip_prefix('.') {
        return CACHE_EXTENSIONS.contains(&ext);
    }
    rest.strip_prefix('_')
        .and_then(|sized| sized.strip_suffix(".png"))
        .and_then(|size| size.parse::<u32>().ok())
        .is_some_and(|size| CASCADE_SIZES.contains(&size))
}
