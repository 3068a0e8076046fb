use std::path::Path;

use async_trait::async_trait;

use crate::{artifact::Artifact, error::Result, source::SourceId};

/// Produces one derivative for one source file.
///
/// Implementations run inside a worker-pool slot and may take as long as
/// the pool's job timeout allows; the future is dropped when it expires.
#[async_trait]
pub trait DerivativeProducer: Send + Sync + 'static {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn produce(&self, source: &SourceId, path: &Path) -> Result<Artifact>;
}
