use crate::record::LogMessage;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::error::Error;

/// A sink that simply drops all messages.
///
/// Useful when only the layer's counters matter, or while the real
/// transport is not wired up yet.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _message: &LogMessage) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
