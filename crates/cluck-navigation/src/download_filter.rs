//! Binary download blocking
//!
//! Installable packages and opaque binaries are never rendered or saved by
//! the shell. Responses are matched on their declared MIME type and on the
//! extension of the final URL's path.

use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Blocks responses that carry installable packages
pub struct DownloadFilter {
    mime_types: Vec<String>,
    extensions: Vec<String>,
    downloads_blocked: AtomicU64,
}

impl DownloadFilter {
    /// Creates a filter from MIME types and extensions (without the dot)
    pub fn new<M, E>(mime_types: M, extensions: E) -> Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mime_types: Vec<String> = mime_types
            .into_iter()
            .map(|m| normalize_mime(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        log::info!(
            "Download filter: {} MIME types, {} extensions",
            mime_types.len(),
            extensions.len()
        );

        Self {
            mime_types,
            extensions,
            downloads_blocked: AtomicU64::new(0),
        }
    }

    /// Check whether a response should be cancelled. Counts blocked responses.
    pub fn should_block(&self, url: &str, mime_type: Option<&str>) -> bool {
        let mime_blocked = mime_type
            .map(normalize_mime)
            .is_some_and(|mime| self.mime_types.iter().any(|m| *m == mime));

        let extension_blocked = path_extension(url)
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext));

        if mime_blocked || extension_blocked {
            log::debug!("Blocked download: {} ({:?})", url, mime_type);
            self.downloads_blocked.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Get blocking statistics
    pub fn get_stats(&self) -> BlockingStats {
        BlockingStats {
            downloads_blocked: self.downloads_blocked.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about blocked responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingStats {
    pub downloads_blocked: u64,
}

/// `Text/HTML; charset=utf-8` -> `text/html`
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Lowercased extension of the last path segment
fn path_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
