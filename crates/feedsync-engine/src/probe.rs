//! Image reachability probing
//!
//! Optional HEAD check against each image candidate before it is sent to the
//! destination. A candidate survives when the probe returns a success status,
//! an image content type and a declared size within the configured ceiling.
//! Probe failures only drop the candidate; records are never rejected here.

use crate::config::ImagePolicy;
use crate::error::Result;
use futures::future::join_all;
use tracing::debug;

pub struct ImageProber {
    client: reqwest::Client,
    policy: ImagePolicy,
}

impl ImageProber {
    pub fn new(policy: ImagePolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.probe_timeout())
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, policy })
    }

    /// Probe all candidates concurrently and keep the reachable ones in
    /// their original order.
    pub async fn filter_reachable(&self, candidates: &[String]) -> Vec<String> {
        let checks = candidates.iter().map(|url| self.head_ok(url));
        let results = join_all(checks).await;

        candidates
            .iter()
            .zip(results)
            .filter_map(|(url, ok)| {
                if ok {
                    Some(url.clone())
                } else {
                    debug!(url = %url, "dropping unreachable image candidate");
                    None
                }
            })
            .collect()
    }

    async fn head_ok(&self, url: &str) -> bool {
        let response = match self.client.head(url).send().await {
            Ok(response) => response,
            Err(_) => return false,
        };

        if !response.status().is_success() {
            return false;
        }

        let is_image = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false);
        if !is_image {
            return false;
        }

        match response.content_length() {
            Some(length) => length <= self.policy.max_image_bytes,
            // Missing content length is accepted; many CDNs omit it on HEAD
            None => true,
        }
    }
}
