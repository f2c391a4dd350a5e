//! Lightweight reachability check for candidate media URLs.

use std::time::Duration;

use reqwest::redirect::Policy;
use tracing::debug;

use vhunter_core::VideoError;

/// Issues HEAD requests without following redirects.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
    user_agent: String,
}

impl Prober {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Result<Self, VideoError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| VideoError::network(format!("build probe client: {e}")))?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }

    /// Whether `url` answers a HEAD with 2xx or 3xx.
    pub async fn is_reachable(&self, url: &str) -> bool {
        match self
            .client
            .head(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
        {
            Ok(resp) => {
                let status = resp.status();
                let ok = status.is_success() || status.is_redirection();
                debug!(url = %url, status = %status, reachable = ok, "probed candidate");
                ok
            }
            Err(e) => {
                debug!(url = %url, error = %e, "probe failed");
                false
            }
        }
    }
}
