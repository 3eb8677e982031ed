//! The narrative service seam.
//!
//! Rooms never wait on narration. The actor spawns each request under
//! [`RoomConfig::narrative_timeout`](crate::RoomConfig) and falls back to
//! the theme's canned text on error or timeout.

use std::future::Future;

use nightfall_engine::NarrativeRequest;

/// Why a narrator produced no text.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrator unavailable: {0}")]
    Unavailable(String),

    #[error("narrator returned empty text")]
    Empty,
}

/// Rejects a passage with nothing but whitespace.
pub(crate) fn non_empty(text: String) -> Result<String, NarrativeError> {
    if text.trim().is_empty() {
        return Err(NarrativeError::Empty);
    }
    Ok(text)
}

/// Writes the passage for one narration request.
///
/// Implementations typically call out to a text-generation service.
pub trait Narrator: Send + Sync + 'static {
    fn narrate(
        &self,
        request: NarrativeRequest,
    ) -> impl Future<Output = Result<String, NarrativeError>> + Send;
}

/// A narrator that always answers with the theme's canned text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedNarrator;

impl Narrator for CannedNarrator {
    async fn narrate(&self, request: NarrativeRequest) -> Result<String, NarrativeError> {
        Ok(request.fallback())
    }
}
