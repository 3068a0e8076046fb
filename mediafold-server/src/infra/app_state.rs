use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use mediafold_config::{Config, ConversionStrategy};
use mediafold_core::{
    DerivativePipeline, MediaLibrary, StreamingTranscoder, ToolStatus,
};

/// The one live conversion path for this process.
#[derive(Clone)]
pub enum ConversionService {
    /// Every request launches the tool and tails its output.
    Stream(StreamingTranscoder),
    /// Conversions are produced in the background and served from cache.
    Queue(DerivativePipeline),
}

impl ConversionService {
    pub fn strategy(&self) -> ConversionStrategy {
        match self {
            ConversionService::Stream(_) => ConversionStrategy::Stream,
            ConversionService::Queue(_) => ConversionStrategy::Queue,
        }
    }

    pub fn pipeline(&self) -> Option<&DerivativePipeline> {
        match self {
            ConversionService::Queue(pipeline) => Some(pipeline),
            ConversionService::Stream(_) => None,
        }
    }
}

impl fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionService::Stream(transcoder) => {
                f.debug_tuple("Stream").field(transcoder).finish()
            }
            ConversionService::Queue(pipeline) => {
                f.debug_tuple("Queue").field(pipeline).finish()
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppState {
    config: Arc<Config>,
    library: MediaLibrary,
    thumbnails: DerivativePipeline,
    conversion: ConversionService,
    tool: Arc<ToolStatus>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        thumbnails: DerivativePipeline,
        conversion: ConversionService,
        tool: ToolStatus,
    ) -> Self {
        Self {
            library: MediaLibrary::new(config.media_root()),
            config,
            thumbnails,
            conversion,
            tool: Arc::new(tool),
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn library(&self) -> &MediaLibrary {
        &self.library
    }

    pub fn thumbnails(&self) -> &DerivativePipeline {
        &self.thumbnails
    }

    pub fn conversion(&self) -> &ConversionService {
        &self.conversion
    }

    pub fn tool(&self) -> &ToolStatus {
        &self.tool
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Stop every dispatcher loop.
    pub async fn shutdown(&self) {
        self.thumbnails.shutdown().await;
        if let Some(pipeline) = self.conversion.pipeline() {
            pipeline.shutdown().await;
        }
    }
}
