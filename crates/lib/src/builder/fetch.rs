//! Downloading release artifacts.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::BuildFailure;
use crate::util::hash::hash_bytes;

pub trait Fetcher: Send + Sync {
  /// Download `url` to `dest`. `dest` only appears once the download completed.
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildFailure>;
}

/// Blocking HTTP downloader.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
  client: reqwest::blocking::Client,
}

impl HttpFetcher {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), BuildFailure> {
    info!(url = %url, "fetching URL");

    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }

    let fetch_failed = |message: String| BuildFailure::Fetch {
      url: url.to_string(),
      message,
    };

    let mut response = self.client.get(url).send().map_err(|e| fetch_failed(e.to_string()))?;
    if !response.status().is_success() {
      return Err(fetch_failed(format!("HTTP {}", response.status())));
    }

    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)?;
    let size = match response.copy_to(&mut file) {
      Ok(size) => size,
      Err(e) => {
        drop(file);
        let _ = fs::remove_file(&partial);
        return Err(fetch_failed(e.to_string()));
      }
    };
    drop(file);
    fs::rename(&partial, dest)?;

    debug!(path = ?dest, "wrote download");
    info!(path = ?dest, size, "download complete");
    Ok(())
  }
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of the
/// URL if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", &hash_bytes(url.as_bytes()).0[..16])
}
