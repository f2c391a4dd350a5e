//! Video info lookup: platform resolver first, extraction tool otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vhunter_core::{FailureCategory, Format, MetadataPort, VideoDescriptor, VideoError};

use crate::extract::ExtractionClient;
use crate::platform::{DouyinResolver, ResolvedMedia, is_short_link};

pub struct VideoInfoService {
    resolver: Option<Arc<DouyinResolver>>,
    extractor: ExtractionClient,
}

impl VideoInfoService {
    /// `resolver` is `None` when the platform path is disabled.
    pub const fn new(resolver: Option<Arc<DouyinResolver>>, extractor: ExtractionClient) -> Self {
        Self {
            resolver,
            extractor,
        }
    }
}

/// Descriptor for a media URL found by the platform resolver.
pub fn platform_descriptor(media: ResolvedMedia) -> VideoDescriptor {
    let mut metadata = BTreeMap::new();
    metadata.insert("source".to_string(), "douyin".to_string());
    metadata.insert("direct_url".to_string(), "true".to_string());
    metadata.insert("video_url".to_string(), media.media_url.clone());
    metadata.insert("parsed_by".to_string(), "direct_api".to_string());
    VideoDescriptor {
        title: media
            .title
            .unwrap_or_else(|| FailureCategory::DouyinAccess.fallback_title().to_string()),
        formats: vec![Format {
            url: Some(media.media_url),
            ..Format::best_mp4()
        }],
        metadata,
        can_download: true,
        ..VideoDescriptor::default()
    }
}

#[async_trait]
impl MetadataPort for VideoInfoService {
    async fn resolve(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<VideoDescriptor, VideoError> {
        if let Some(resolver) = self.resolver.as_ref().filter(|r| r.handles(url)) {
            match resolver.try_direct_resolve(url, &cancel).await {
                Ok(media) => return Ok(platform_descriptor(media)),
                Err(e) if e.is_cancelled() || is_short_link(url) => return Err(e),
                Err(e) => debug!(url = %url, error = %e, "platform lookup failed, using extractor"),
            }
        }
        self.extractor.fetch_descriptor(url, &cancel).await
    }
}
