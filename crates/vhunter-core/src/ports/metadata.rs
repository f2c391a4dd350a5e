//! Metadata port: URL → [`VideoDescriptor`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::descriptor::VideoDescriptor;
use crate::errors::VideoError;

/// Resolve descriptive metadata for a URL.
///
/// Failures with a known remediation are returned as
/// [`VideoError::Unresolved`] carrying a descriptor.
#[async_trait]
pub trait MetadataPort: Send + Sync {
    async fn resolve(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> Result<VideoDescriptor, VideoError>;
}
