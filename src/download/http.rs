//! HTTP access to release hosts

use futures::StreamExt;
use log::debug;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use super::checksum::{DigestAlgorithm, StreamingDigest};
use crate::config::HttpConfig;
use crate::error::{FetchError, Result};
use crate::progress::{FetchProgress, ProgressSender};

/// Emit a progress update at most every 256KB
const PROGRESS_CHUNK: u64 = 256 * 1024;

/// Result of streaming a download to disk
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub bytes: u64,
    /// Lowercase hex digest of the downloaded bytes
    pub digest: String,
}

/// Shared client for every fetch in a run
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    inactivity_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            inactivity_timeout: config.inactivity_timeout(),
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);

        // GitHub rate-limits anonymous release downloads
        if is_github(url) {
            if let Some(token) = github_token() {
                request = request.bearer_auth(token);
            }
        }

        request
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        // A host may accept the connection and never answer
        let response = match timeout(self.inactivity_timeout, self.request(url).send()).await {
            Ok(sent) => sent.map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(FetchError::Stalled {
                    url: url.to_string(),
                    seconds: self.inactivity_timeout.as_secs(),
                });
            }
        };

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }

    /// Fetch a small text document (checksum sidecar or manifest)
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);

        let response = self.send(url).await?;
        match timeout(self.inactivity_timeout, response.text()).await {
            Ok(body) => body.map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            }),
            Err(_) => Err(FetchError::Stalled {
                url: url.to_string(),
                seconds: self.inactivity_timeout.as_secs(),
            }),
        }
    }

    /// Stream `url` into `dest`, hashing the bytes on the way
    pub async fn download_to(
        &self,
        tool: &str,
        url: &str,
        dest: &Path,
        algorithm: DigestAlgorithm,
        progress: &ProgressSender,
    ) -> Result<Downloaded> {
        debug!("Downloading {} from {}", tool, url);

        let response = self.send(url).await?;
        let total_bytes = response.content_length();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut digest = StreamingDigest::new(algorithm);
        let mut downloaded: u64 = 0;
        let mut last_progress_bytes = 0u64;

        let mut stream = response.bytes_stream();

        loop {
            let chunk = match timeout(self.inactivity_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(source))) => {
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        source,
                    });
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(FetchError::Stalled {
                        url: url.to_string(),
                        seconds: self.inactivity_timeout.as_secs(),
                    });
                }
            };

            file.write_all(&chunk).await?;
            digest.update(&chunk);
            downloaded += chunk.len() as u64;

            if downloaded - last_progress_bytes >= PROGRESS_CHUNK {
                progress.send(FetchProgress::downloading(tool, downloaded, total_bytes));
                last_progress_bytes = downloaded;
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        if last_progress_bytes != downloaded {
            progress.send(FetchProgress::downloading(tool, downloaded, total_bytes));
        }

        Ok(Downloaded {
            bytes: downloaded,
            digest: digest.finalize_hex(),
        })
    }
}

fn is_github(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .is_some_and(|host| host == "github.com" || host.ends_with(".github.com"))
}

fn github_token() -> Option<String> {
    std::env::var("GITHUB_TOKEN")
        .or_else(|_| std::env::var("GH_TOKEN"))
        .ok()
        .filter(|t| !t.is_empty())
}
