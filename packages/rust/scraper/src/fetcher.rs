//! Image download into the local image directory.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use url::Url;

use grimoire_shared::{GrimoireError, ImageSource, LocalImage, Result};

use crate::guard::is_private_target;

/// Extension used when the image URL path has none.
const DEFAULT_EXTENSION: &str = "jpg";

/// Longest URL extension accepted as a file extension.
const MAX_EXTENSION_LEN: usize = 5;

/// Downloads product images to `<image_dir>/<key>.<ext>`.
pub struct ImageFetcher {
    client: Client,
    image_dir: PathBuf,
    allow_private_hosts: bool,
}

impl ImageFetcher {
    pub fn new(client: Client, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            image_dir: image_dir.into(),
            allow_private_hosts: false,
        }
    }

    /// Allow downloading from localhost/private IPs. Redirect hops are still
    /// checked by the client from [`http_client`](crate::http_client).
    pub fn allow_private_hosts(mut self) -> Self {
        self.allow_private_hosts = true;
        self
    }

    /// Download `image` and store it under `key`.
    ///
    /// `ImageSource::NotFound` passes through without touching the network.
    /// Every download failure becomes `LocalImage::DownloadFailed`.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch(&self, image: &ImageSource, key: &str) -> LocalImage {
        let url = match image {
            ImageSource::Found(url) => url,
            ImageSource::NotFound => return LocalImage::NotFound,
        };

        match self.download(url, key).await {
            Ok(path) => {
                info!(path = %path.display(), "image saved");
                LocalImage::Saved(path)
            }
            Err(e) => {
                warn!(%url, error = %e, "image download failed");
                LocalImage::DownloadFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn ensure_allowed(&self, url: &Url) -> Result<()> {
        if !self.allow_private_hosts && is_private_target(url) {
            return Err(GrimoireError::validation(format!("{url}: private host")));
        }
        Ok(())
    }

    async fn download(&self, url: &Url, key: &str) -> Result<PathBuf> {
        self.ensure_allowed(url)?;

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| GrimoireError::Network(format!("{url}: {e}")))?;
        self.ensure_allowed(response.url())?;

        let status = response.status();
        if !status.is_success() {
            return Err(GrimoireError::Network(format!("{url}: HTTP {status}")));
        }

        // Concurrent first use is fine: create_dir_all tolerates existing dirs.
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|e| GrimoireError::io(&self.image_dir, e))?;

        let file_name = image_file_name(key, url);
        let final_path = self.image_dir.join(&file_name);
        let part_path = self.image_dir.join(format!("{file_name}.part"));

        if let Err(e) = write_body(&mut response, &part_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e);
        }

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| GrimoireError::io(&final_path, e))?;

        debug!(%url, bytes = ?response.content_length(), "download complete");
        Ok(final_path)
    }
}

/// Stream the response body into `path`.
async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| GrimoireError::io(path, e))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| GrimoireError::Network(format!("body read failed: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| GrimoireError::io(path, e))?;
    }

    file.flush().await.map_err(|e| GrimoireError::io(path, e))
}

/// File name for a product image: sanitized key plus the URL's extension.
pub fn image_file_name(key: &str, url: &Url) -> String {
    format!("{}.{}", sanitize_key(key), url_extension(url))
}

/// Make a SKU safe to use as a file stem.
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_start_matches('.') {
        "" => "image".to_string(),
        stem => stem.to_string(),
    }
}

/// Lower-cased extension of the URL path, or the default.
fn url_extension(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
