//! Local persistence of description and variant images
//!
//! Images are fetched over HTTP with a shared rate limit and written under
//! `<root>/description_images` or `<root>/variant_images`. The stored file
//! name is the basename of the URL path; URLs without one get a SHA-256
//! derived name.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header::USER_AGENT, Client};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::utils::error::AssetError;
use crate::utils::sanitize_filename;

/// Which detail section an image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Description,
    Variant,
}

impl ImageKind {
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Description => "description_images",
            Self::Variant => "variant_images",
        }
    }
}

/// Persists a remote image and returns the local path to record
#[async_trait]
pub trait ImageSaver: Send + Sync {
    async fn save(&self, url: &str, kind: ImageKind) -> Result<String, AssetError>;
}

/// Parse an image URL, accepting protocol-relative `//host/path` forms
pub fn parse_image_url(raw: &str) -> Result<Url, AssetError> {
    let raw = raw.trim();
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };
    Url::parse(&absolute).map_err(|e| AssetError::InvalidUrl(format!("{raw}: {e}")))
}

/// Local file name for an image URL
pub fn file_name_for(url: &Url) -> String {
    let basename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty());

    match basename {
        Some(name) => sanitize_filename(name),
        None => {
            let digest = Sha256::digest(url.as_str().as_bytes());
            let hex = format!("{digest:x}");
            format!("{}.img", &hex[..16])
        }
    }
}

/// `reqwest`-backed image store with a per-second download quota
pub struct HttpImageStore {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    root: PathBuf,
    user_agent: String,
}

impl HttpImageStore {
    /// # Errors
    ///
    /// Returns `AssetError::Http` if the HTTP client cannot be created
    pub fn new(
        root: &Path,
        requests_per_second: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, AssetError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            root: root.to_path_buf(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ImageSaver for HttpImageStore {
    async fn save(&self, url: &str, kind: ImageKind) -> Result<String, AssetError> {
        let parsed = parse_image_url(url)?;
        let dir = self.root.join(kind.subdir());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name_for(&parsed));

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(parsed.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&path, &bytes).await?;

        debug!(url = %parsed, path = %path.display(), bytes = bytes.len(), "Image saved");
        Ok(path.to_string_lossy().into_owned())
    }
}
