//! Progress reporting sinks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Receives status updates from a run, in step order.
///
/// The loop awaits every call, so implementations must bound their own
/// latency.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// `image` is a raw screenshot when present.
    async fn report(&self, text: &str, image: Option<&[u8]>);
}

/// Prints reports to stdout and saves attached screenshots to disk.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    screenshots_dir: Option<PathBuf>,
}

impl ConsoleReporter {
    /// Reporter that only prints; attached images are not saved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Save attached screenshots under `dir`.
    pub fn with_screenshots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshots_dir = Some(dir.into());
        self
    }

    async fn save_image(dir: &Path, image: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let id = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}.png",
            Local::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        );
        let path = dir.join(name);
        tokio::fs::write(&path, image).await?;
        Ok(path)
    }
}

#[async_trait]
impl ProgressReporter for ConsoleReporter {
    async fn report(&self, text: &str, image: Option<&[u8]>) {
        println!("[REPORT] {}", text);

        let (Some(image), Some(dir)) = (image, self.screenshots_dir.as_deref()) else {
            return;
        };
        match Self::save_image(dir, image).await {
            Ok(path) => println!("[IMAGE] {}", path.display()),
            Err(e) => tracing::warn!(dir = %dir.display(), "failed to save screenshot: {}", e),
        }
    }
}

/// One report as delivered through a [`ChannelReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub text: String,
    pub image: Option<Vec<u8>>,
}

/// Forwards reports to a bounded channel, e.g. for a messaging gateway.
///
/// A full channel is waited on for at most `send_timeout`; after that the
/// report is dropped with a warning so a stalled consumer cannot hold up the
/// run.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::Sender<ProgressEvent>,
    send_timeout: Duration,
}

impl ChannelReporter {
    /// Forward reports to `tx`, waiting at most `send_timeout` per report.
    pub fn new(tx: mpsc::Sender<ProgressEvent>, send_timeout: Duration) -> Self {
        Self { tx, send_timeout }
    }

    /// Create a reporter together with the receiving end.
    pub fn channel(
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, send_timeout), rx)
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    async fn report(&self, text: &str, image: Option<&[u8]>) {
        let event = ProgressEvent {
            text: text.to_string(),
            image: image.map(<[u8]>::to_vec),
        };
        if let Err(e) = self.tx.send_timeout(event, self.send_timeout).await {
            tracing::warn!("progress report dropped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_reporter_delivers_in_order() {
        let (reporter, mut rx) = ChannelReporter::channel(4, Duration::from_millis(50));
        reporter.report("first", None).await;
        reporter.report("second", Some(b"png")).await;

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent {
                text: "first".into(),
                image: None
            })
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(second.text, "second");
        assert_eq!(second.image.as_deref(), Some(&b"png"[..]));
    }

    #[tokio::test]
    async fn test_channel_reporter_full_channel_times_out() {
        let (reporter, mut rx) = ChannelReporter::channel(1, Duration::from_millis(10));
        reporter.report("kept", None).await;
        // nobody is receiving, so this one is dropped after the timeout
        reporter.report("dropped", None).await;

        assert_eq!(rx.recv().await.unwrap().text, "kept");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_channel_reporter_closed_receiver() {
        let (reporter, rx) = ChannelReporter::channel(1, Duration::from_millis(10));
        drop(rx);
        reporter.report("nobody listening", None).await;
    }

    #[tokio::test]
    async fn test_console_reporter_saves_image() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("screenshots");
        let reporter = ConsoleReporter::new().with_screenshots_dir(&shots);

        reporter.report("Success: done", Some(b"fake png")).await;
        reporter.report("no image", None).await;

        let entries: Vec<_> = std::fs::read_dir(&shots).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(path).unwrap(), b"fake png");
    }
}
