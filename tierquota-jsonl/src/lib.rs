//! JSON-lines sink for `tierquota` quota events.
//!
//! Each event becomes one line produced by [`event_to_json`]. The file is opened in append
//! mode per event, so external rotation (rename + recreate) is picked up without a restart.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tierquota::telemetry::{event_to_json, QuotaEvent, TelemetrySink};
use tokio::io::AsyncWriteExt;

/// Appends quota events to a file, one JSON object per line. Clones share the path.
#[derive(Clone, Debug)]
pub struct JsonlSink {
    path: Arc<PathBuf>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: Arc::new(path.into()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn append_line(path: &Path, line: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line).await?;
    file.flush().await
}

impl tower_service::Service<QuotaEvent> for JsonlSink {
    type Response = ();
    type Error = io::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: QuotaEvent) -> Self::Future {
        let path = Arc::clone(&self.path);
        let kind = event.kind();
        let mut line = event_to_json(&event).to_string();
        line.push('\n');
        Box::pin(async move {
            append_line(&path, line.as_bytes()).await.map_err(|e| {
                tracing::warn!(
                    target: "tierquota::jsonl",
                    path = %path.display(),
                    kind,
                    error = %e,
                    "quota event not appended"
                );
                e
            })
        })
    }
}

impl TelemetrySink for JsonlSink {
    type SinkError = io::Error;
}
