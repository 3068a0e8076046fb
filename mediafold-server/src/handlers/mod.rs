pub mod conversion;
pub mod health;
pub mod library;
pub mod thumbnails;

use mediafold_core::SourceId;

use crate::infra::errors::AppResult;

/// Canonicalise a router-captured path.
pub(crate) fn parse_source(raw: &str) -> AppResult<SourceId> {
    Ok(SourceId::parse(raw)?)
}
