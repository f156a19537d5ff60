//! Unix domain socket fan-out of scan events
//!
//! Every connected client receives each [`ScanEvent`] as one JSON line.

#![cfg(target_family = "unix")]

use crate::error::{Error, Result};
use crate::output::ScanEvent;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 64;

/// Listening socket plus the channel feeding its clients
pub struct UnixBroadcast {
    sender: broadcast::Sender<Arc<str>>,
    accept_task: JoinHandle<()>,
    socket_path: PathBuf,
}

impl UnixBroadcast {
    /// Bind `path`, replacing a stale socket file, and start accepting clients.
    pub async fn bind(path: &Path) -> Result<Arc<Self>> {
        let io_context = |what: &str, e: std::io::Error| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{what} {}: {e}", path.display()),
            ))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_context("Failed to create directory for", e))?;
        }

        if path.exists() {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| io_context("Failed to remove existing socket", e))?;
        }

        let listener =
            UnixListener::bind(path).map_err(|e| io_context("Failed to bind Unix socket", e))?;
        tracing::info!(socket = %path.display(), "publishing scan events");

        let (sender, _) = broadcast::channel::<Arc<str>>(CHANNEL_CAPACITY);
        let accept_task = tokio::spawn(accept_loop(listener, sender.clone()));

        Ok(Arc::new(Self {
            sender,
            accept_task,
            socket_path: path.to_path_buf(),
        }))
    }

    /// Path the socket is bound to
    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Serialize and broadcast an event. Fails when nobody is listening.
    pub fn send_event(&self, event: &ScanEvent) -> Result<()> {
        let line: Arc<str> = serde_json::to_string(event)?.into();
        self.sender
            .send(line)
            .map(|_| ())
            .map_err(|_| Error::Other("no Unix socket clients connected".to_string()))
    }
}

impl Drop for UnixBroadcast {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Err(err) = std::fs::remove_file(&self.socket_path) {
            tracing::debug!(
                "Failed to cleanup Unix socket {}: {}",
                self.socket_path.display(),
                err
            );
        }
    }
}

async fn accept_loop(listener: UnixListener, sender: broadcast::Sender<Arc<str>>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(serve_client(stream, sender.subscribe()));
            }
            Err(err) => tracing::warn!("Unix socket accept error: {err}"),
        }
    }
}

async fn serve_client(mut stream: UnixStream, mut rx: broadcast::Receiver<Arc<str>>) {
    loop {
        let line = match rx.recv().await {
            Ok(line) => line,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "slow Unix socket client skipped events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let written = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await
        };
        if let Err(err) = written.await {
            tracing::debug!("Unix socket client write error: {err}");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_client_receives_events() {
        let dir = std::env::temp_dir().join(format!("camscan-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("events.sock");
        let hub = UnixBroadcast::bind(&path).await.expect("bind");

        assert!(
            hub.send_event(&ScanEvent::CameraShown).is_err(),
            "no clients yet"
        );

        let client = UnixStream::connect(&path).await.expect("connect");
        while hub.client_count() == 0 {
            tokio::task::yield_now().await;
        }

        hub.send_event(&ScanEvent::Submitted {
            barcode: "036000291452".to_string(),
        })
        .expect("send");

        let mut lines = BufReader::new(client).lines();
        let line = lines.next_line().await.expect("read").expect("line");
        let event: ScanEvent = serde_json::from_str(&line).expect("parse");
        assert_eq!(
            event,
            ScanEvent::Submitted {
                barcode: "036000291452".to_string()
            }
        );

        drop(hub);
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
