//! Side effects of re-rendering a live episode.

use async_trait::async_trait;
use castkit_common::config::PublishingConfig;
use castkit_common::error::{CastError, CastResult};
use castkit_episode_model::episode::{Episode, Podcast};

/// Downstream consumers told about a fresh render of a public episode.
///
/// Failures are reported to the caller, which logs them; they never fail the
/// render.
#[async_trait]
pub trait PublishHooks: Send + Sync {
    /// Rebuild the podcast's public feed.
    async fn regenerate_feed(&self, podcast: &Podcast, episode: &Episode) -> CastResult<()>;

    /// Tell push subscribers the feed changed.
    async fn notify_hub(&self, podcast: &Podcast) -> CastResult<()>;
}

/// For deployments with nothing downstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl PublishHooks for NoopPublisher {
    async fn regenerate_feed(&self, _podcast: &Podcast, _episode: &Episode) -> CastResult<()> {
        Ok(())
    }

    async fn notify_hub(&self, _podcast: &Podcast) -> CastResult<()> {
        Ok(())
    }
}

/// Pings a WebSub hub with the podcast's feed URL.
///
/// castkit does not build feed documents. Its
/// [`PublishHooks::regenerate_feed`] is a hook for an external feed builder
/// that serves `feed_url_template` and rebuilds on request; here it only logs
/// that the feed is stale. Wrap or replace this publisher to trigger a real
/// rebuild.
#[derive(Debug, Clone)]
pub struct WebSubPublisher {
    client: reqwest::Client,
    hub_url: String,
    feed_url_template: String,
}

impl WebSubPublisher {
    pub fn new(hub_url: impl Into<String>, feed_url_template: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            hub_url: hub_url.into(),
            feed_url_template: feed_url_template.into(),
        }
    }

    /// `None` unless both the hub and the feed URL template are configured.
    pub fn from_config(config: &PublishingConfig) -> Option<Self> {
        match (&config.hub_url, &config.feed_url_template) {
            (Some(hub), Some(feed)) if !hub.trim().is_empty() && !feed.trim().is_empty() => {
                Some(Self::new(hub.trim(), feed.trim()))
            }
            _ => None,
        }
    }

    pub fn feed_url(&self, podcast: &Podcast) -> String {
        self.feed_url_template.replace("{podcast}", &podcast.handle)
    }
}

#[async_trait]
impl PublishHooks for WebSubPublisher {
    /// Hook for an external feed builder. Logs the stale feed and does no I/O.
    async fn regenerate_feed(&self, podcast: &Podcast, episode: &Episode) -> CastResult<()> {
        tracing::info!(
            podcast = %podcast.handle,
            episode_id = %episode.id,
            feed = %self.feed_url(podcast),
            "Feed marked for regeneration"
        );
        Ok(())
    }

    async fn notify_hub(&self, podcast: &Podcast) -> CastResult<()> {
        let feed_url = self.feed_url(podcast);
        let response = self
            .client
            .post(&self.hub_url)
            .form(&[("hub.mode", "publish"), ("hub.url", feed_url.as_str())])
            .send()
            .await
            .map_err(|e| CastError::processing(format!("Hub request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CastError::processing(format!(
                "Hub {} answered {status}",
                self.hub_url
            )));
        }
        tracing::info!(hub = %self.hub_url, feed = %feed_url, "Hub notified");
        Ok(())
    }
}
