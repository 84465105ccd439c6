use crate::record::LogMessage;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogMessage`]s produced by the layer.
///
/// Implementations own the transport to the error-tracking service
/// (HTTP client, queue, file spool). The layer calls `send` from a
/// background task and never awaits it on the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single log message, including its error record if any.
    ///
    /// **Returns**
    /// - `Ok(())` if the transport accepted the message.
    /// - `Err(..)` if it did not. The layer reports the failure and moves
    ///   on; redelivery is the transport's business.
    async fn send(&self, message: &LogMessage) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Flush any buffered messages, if the transport buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
