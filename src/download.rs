//! Dataset download over HTTP(S).

use anyhow::Context;
use regex::Regex;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const DRIVE_EXPORT_URL: &str = "https://drive.google.com/uc";

/// Where a dataset archive can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A Google Drive share link, reduced to its file identifier
    GoogleDrive { file_id: String },
    /// A plain link straight to a `.zip`
    Direct(String),
}

impl DatasetSource {
    pub fn parse(url: &str) -> anyhow::Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            anyhow::bail!("dataset download URL is not configured");
        }
        let parsed =
            Url::parse(url).with_context(|| format!("unexpected dataset URL format: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unexpected dataset URL format: {}", url);
        }

        if parsed.host_str() == Some("drive.google.com") {
            // .../file/d/<id>/view?usp=sharing
            let segments: Vec<&str> = parsed.path_segments().map(|s| s.collect()).unwrap_or_default();
            if let Some(pos) = segments.iter().position(|s| *s == "d") {
                if let Some(id) = segments.get(pos + 1).filter(|id| !id.is_empty()) {
                    return Ok(Self::GoogleDrive { file_id: id.to_string() });
                }
            }
            if let Some((_, id)) = parsed.query_pairs().find(|(k, _)| k == "id") {
                if !id.is_empty() {
                    return Ok(Self::GoogleDrive { file_id: id.into_owned() });
                }
            }
            anyhow::bail!("unexpected dataset URL format: no file id in {}", url);
        }

        if parsed.path().to_ascii_lowercase().ends_with(".zip") {
            return Ok(Self::Direct(url.to_string()));
        }

        anyhow::bail!("unexpected dataset URL format: {}", url)
    }

    /// URL the payload is actually requested from
    pub fn fetch_url(&self) -> String {
        match self {
            Self::GoogleDrive { file_id } => {
                format!("{}?export=download&id={}", DRIVE_EXPORT_URL, file_id)
            }
            Self::Direct(url) => url.clone(),
        }
    }
}

/// Fetches a remote payload into a local file
pub trait Downloader {
    /// Download `url` into `dest`, returning the number of bytes written
    fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64>;
}

pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            // Large archives take a while; only the connect phase is bounded
            .timeout(None::<Duration>)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> anyhow::Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()
            .with_context(|| format!("GET {} returned an error status", url))?;
        Ok(response)
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let mut response = self.get(url)?;

        if is_html(&response) {
            // Drive serves a "can't scan for viruses" page for large files
            let body = response.text().context("Failed to read interstitial page")?;
            let next = drive_confirm_url(&body).ok_or_else(|| {
                anyhow::anyhow!("{} returned an HTML page instead of a file", url)
            })?;
            debug!("Following download confirmation to {}", next);
            response = self.get(&next)?;
            if is_html(&response) {
                anyhow::bail!("{} still returned an HTML page after confirmation", url);
            }
        }

        let mut file =
            File::create(dest).with_context(|| format!("Failed to create {:?}", dest))?;
        let bytes = response
            .copy_to(&mut file)
            .with_context(|| format!("Failed to write download to {:?}", dest))?;
        info!("Downloaded {} bytes into {:?}", bytes, dest);
        Ok(bytes)
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false)
}

/// Build the follow-up URL from Drive's confirmation page, if it has one
pub fn drive_confirm_url(html: &str) -> Option<String> {
    let form = Regex::new(r#"<form[^>]*id="download-form"[^>]*action="([^"]+)""#).ok()?;
    if let Some(caps) = form.captures(html) {
        let action = caps[1].replace("&amp;", "&");
        let input = Regex::new(r#"<input type="hidden" name="([^"]+)" value="([^"]*)""#).ok()?;
        let params: Vec<(String, String)> = input
            .captures_iter(html)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();
        return Url::parse_with_params(&action, &params).ok().map(String::from);
    }

    // Older page layout links straight to uc?export=download&confirm=...
    let link = Regex::new(r#"href="(/uc\?export=download[^"]*confirm=[^"]+)""#).ok()?;
    link.captures(html).map(|c| {
        format!("https://drive.google.com{}", c[1].replace("&amp;", "&"))
    })
}

/// Check the local-file-header magic of a zip archive
pub fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    use std::io::Read;
    let mut magic = [0u8; 4];
    let mut file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == *b"PK\x03\x04"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
    }
}
