//! Douyin platform resolver.
//!
//! Finds a playable media URL for a Douyin page without going through the
//! extraction tool. Strategies run in order and the first candidate that
//! passes a HEAD probe wins:
//!
//! 1. first-party JSON endpoints keyed by the numeric video id
//! 2. third-party relays
//! 3. a curl fetch of the page, mined for an id (back to step 1) or a media URL
//!
//! Exhausting every strategy yields [`VideoError::Unresolved`] whose
//! descriptor distinguishes short links from long links.

pub mod api;
pub mod probe;
pub(crate) mod relay;
pub(crate) mod scrape;
pub mod urls;

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vhunter_core::{FailureCategory, Settings, VideoDescriptor, VideoError};

use crate::process::resolve_tool;
use api::{ACCEPT_LANGUAGE, DOUYIN_REFERER, Endpoint};
pub use probe::Prober;
pub use urls::{canonicalize, is_douyin_url, is_short_link};

/// A media URL the resolver vouches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub media_url: String,
    pub title: Option<String>,
}

pub struct DouyinResolver {
    http: reqwest::Client,
    prober: Prober,
    curl_path: String,
    mobile_user_agent: String,
    api_timeout: Duration,
}

impl DouyinResolver {
    pub fn new(settings: &Settings) -> Result<Self, VideoError> {
        let api_timeout = Duration::from_secs(settings.douyin.api_timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(api_timeout)
            .build()
            .map_err(|e| VideoError::network(format!("build http client: {e}")))?;
        let prober = Prober::new(
            settings.douyin.mobile_user_agent.clone(),
            Duration::from_secs(settings.downloader.probe_timeout_secs),
        )?;
        Ok(Self {
            http,
            prober,
            curl_path: settings.downloader.curl_path.clone(),
            mobile_user_agent: settings.douyin.mobile_user_agent.clone(),
            api_timeout,
        })
    }

    pub fn handles(&self, url: &str) -> bool {
        is_douyin_url(url)
    }

    /// Resolve `url` to a probed media URL, or explain why not.
    pub async fn try_direct_resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedMedia, VideoError> {
        if !is_douyin_url(url) {
            return Err(VideoError::UnsupportedUrl(url.to_string()));
        }
        let canonical = canonicalize(url);

        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(VideoError::Cancelled),

            result = self.run_strategies(&canonical, cancel) => result,
        }
    }

    async fn run_strategies(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedMedia, VideoError> {
        let mut failures = Vec::new();

        if let Some(id) = urls::video_id(url) {
            match self.via_endpoints(&id).await {
                Ok(media) => return Ok(media),
                Err(e) => failures.push(format!("api: {e}")),
            }
        }

        match self.via_relays(url).await {
            Ok(media) => return Ok(media),
            Err(e) => failures.push(format!("relays: {e}")),
        }

        match self.via_scrape(url, cancel).await {
            Ok(media) => return Ok(media),
            Err(VideoError::Cancelled) => return Err(VideoError::Cancelled),
            Err(e) => failures.push(format!("scrape: {e}")),
        }

        let category = if is_short_link(url) {
            FailureCategory::DouyinShortLink
        } else {
            FailureCategory::DouyinAccess
        };
        let detail = failures.join("; ");
        info!(url = %url, category = category.as_str(), "douyin resolution exhausted");
        Err(VideoError::unresolved(
            format!("Could not resolve Douyin video: {detail}"),
            VideoDescriptor::unresolved(category, detail),
        ))
    }

    async fn via_endpoints(&self, video_id: &str) -> Result<ResolvedMedia, String> {
        let mut last = String::from("no endpoint answered");
        for endpoint in Endpoint::ORDER {
            match self.query_endpoint(endpoint, video_id).await {
                Ok(media) => {
                    info!(video_id = %video_id, endpoint = endpoint.name(), "resolved via api");
                    return Ok(media);
                }
                Err(e) => {
                    debug!(video_id = %video_id, endpoint = endpoint.name(), error = %e, "endpoint failed");
                    last = format!("{}: {e}", endpoint.name());
                }
            }
        }
        Err(last)
    }

    async fn query_endpoint(&self, endpoint: Endpoint, video_id: &str) -> Result<ResolvedMedia, String> {
        let mut req = self.http.get(endpoint.url(video_id));
        for (name, value) in endpoint.headers(video_id, &self.mobile_user_agent) {
            req = req.header(name, value);
        }
        let body = req
            .send()
            .await
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        let video = endpoint.decode(&body)?;
        let media_url = self
            .first_reachable(&video.candidates)
            .await
            .ok_or_else(|| "no reachable play address".to_string())?;
        Ok(ResolvedMedia {
            media_url,
            title: Some(video.title).filter(|t| !t.is_empty()),
        })
    }

    async fn via_relays(&self, url: &str) -> Result<ResolvedMedia, String> {
        let mut last = String::from("no relay answered");
        for base in relay::RELAYS {
            let target = relay::relay_url(base, url);
            let answer = match self.fetch_relay(&target).await {
                Ok(answer) => answer,
                Err(e) => {
                    debug!(relay = %base, error = %e, "relay failed");
                    last = format!("{base}: {e}");
                    continue;
                }
            };
            if self.prober.is_reachable(&answer.media_url).await {
                info!(relay = %base, "resolved via relay");
                return Ok(ResolvedMedia {
                    media_url: answer.media_url,
                    title: answer.title,
                });
            }
            last = format!("{base}: candidate unreachable");
        }
        Err(last)
    }

    async fn fetch_relay(&self, target: &str) -> Result<relay::RelayAnswer, String> {
        let body = self
            .http
            .get(target)
            .header(reqwest::header::USER_AGENT, &self.mobile_user_agent)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::REFERER, DOUYIN_REFERER)
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        relay::parse_relay_body(&body)
    }

    async fn via_scrape(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedMedia, VideoError> {
        let curl = resolve_tool(&self.curl_path)?;
        let html = scrape::fetch_page(&curl, url, &self.mobile_user_agent, self.api_timeout, cancel)
            .await?;

        if let Some(id) = scrape::extract_video_id(&html) {
            debug!(video_id = %id, "found id in page");
            if let Ok(media) = self.via_endpoints(&id).await {
                return Ok(media);
            }
        }

        let media_url = scrape::extract_media_url(&html)
            .ok_or_else(|| VideoError::parse("douyin page", "no media URL in page"))?;
        if !self.prober.is_reachable(&media_url).await {
            return Err(VideoError::network("scraped media URL is unreachable"));
        }
        info!(url = %url, "resolved via page scrape");
        Ok(ResolvedMedia {
            media_url,
            title: scrape::extract_title(&html),
        })
    }

    async fn first_reachable(&self, candidates: &[String]) -> Option<String> {
        for candidate in candidates {
            if self.prober.is_reachable(candidate).await {
                return Some(candidate.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_foreign_urls() {
        let resolver = DouyinResolver::new(&Settings::with_defaults()).unwrap();
        let err = resolver
            .try_direct_resolve("https://example.com/video/1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedUrl(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let resolver = DouyinResolver::new(&Settings::with_defaults()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver
            .try_direct_resolve("https://v.douyin.com/abc/", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
