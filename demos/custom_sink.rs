use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, info_span};
use tracing_event_adapter::{init::init_tracing, LogMessage, LogSink};

/// Example of plugging in a transport by implementing `LogSink`
/// directly. A real one would POST the JSON to the tracking service.
struct StdoutJsonSink;

#[async_trait]
impl LogSink for StdoutJsonSink {
    async fn send(&self, message: &LogMessage) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("{}", serde_json::to_string(message)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let handle = init_tracing(Arc::new(StdoutJsonSink))?;

    info!("custom sink example started");

    let span = info_span!("get_order", trans_id = "b7e1", user = "alice", http.method = "GET", http.url = "/orders/7");
    {
        let _guard = span.enter();
        let err = "seven".parse::<u32>().unwrap_err();
        error!(error = &err as &(dyn std::error::Error + 'static), order_id = "7", "could not parse order id");
    }

    // Let the forwarding task drain before exiting.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.abort();
    Ok(())
}
