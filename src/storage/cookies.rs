//! Session cookie persistence (`cookies.json`)
//!
//! Reads both browser-extension exports and the files this crate writes.
//! Each record is normalized on its own; a bad record is skipped with a
//! warning and never invalidates the rest of the file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::render::{Cookie, SameSite};
use crate::utils::error::StoreError;

/// Cookie record as found on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCookie {
    name: Option<String>,
    value: Option<Value>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    #[serde(alias = "expires")]
    expiration_date: Option<f64>,
    same_site: Option<String>,
}

/// Cookie record as written by [`CookieJar::save`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie<'a> {
    name: &'a str,
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    path: &'a str,
    secure: bool,
    http_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_date: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    same_site: Option<&'static str>,
}

impl<'a> From<&'a Cookie> for StoredCookie<'a> {
    fn from(cookie: &'a Cookie) -> Self {
        Self {
            name: &cookie.name,
            value: &cookie.value,
            domain: cookie.domain.as_deref(),
            path: &cookie.path,
            secure: cookie.secure,
            http_only: cookie.http_only,
            expiration_date: cookie.expires,
            same_site: cookie.same_site.map(|s| s.as_str()),
        }
    }
}

/// Map the `sameSite` spellings seen in exports onto the session policy.
/// `unspecified` and unknown values mean "let the browser decide".
pub fn parse_same_site(raw: &str) -> Option<SameSite> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "no_restriction" | "none" => Some(SameSite::None),
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        _ => None,
    }
}

fn normalize(raw: RawCookie) -> Result<Cookie, String> {
    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| "missing name".to_string())?;

    let value = match raw.value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let path = raw
        .path
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "/".to_string());

    Ok(Cookie {
        name,
        value,
        domain: raw.domain.filter(|d| !d.trim().is_empty()),
        path,
        secure: raw.secure,
        http_only: raw.http_only,
        // Playwright exports -1 for session cookies
        expires: raw.expiration_date.filter(|e| *e > 0.0).map(f64::trunc),
        same_site: raw.same_site.as_deref().and_then(parse_same_site),
    })
}

/// Parse a cookie file body, skipping records that cannot be normalized
pub fn parse_cookies(contents: &str) -> Result<Vec<Cookie>, StoreError> {
    let entries: Vec<Value> = serde_json::from_str(contents)?;
    let mut cookies = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let outcome = serde_json::from_value::<RawCookie>(entry)
            .map_err(|e| e.to_string())
            .and_then(normalize);

        match outcome {
            Ok(cookie) => {
                tracing::debug!(name = %cookie.name, domain = ?cookie.domain, "Cookie loaded");
                cookies.push(cookie);
            }
            Err(reason) => tracing::warn!(index, reason = %reason, "Skipping cookie record"),
        }
    }

    Ok(cookies)
}

/// File-backed cookie jar; the last session's cookies always win
#[derive(Debug, Clone)]
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load normalized cookies; a missing or malformed file yields an empty jar
    pub fn load(&self) -> Result<Vec<Cookie>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No cookie file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        match parse_cookies(&contents) {
            Ok(cookies) => Ok(cookies),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cookie file is malformed, ignoring it");
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the jar with `cookies` (temp file + rename)
    pub fn save(&self, cookies: &[Cookie]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut temp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cookies.json".into());
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        let records: Vec<StoredCookie<'_>> = cookies.iter().map(StoredCookie::from).collect();
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), count = cookies.len(), "Cookies saved");
        Ok(())
    }
}
