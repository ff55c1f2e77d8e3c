//! IPC transport over `tokio::net::UnixStream`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::Mutex;

use ethwire_core::error::TransportError;
use ethwire_core::transport::{FrameStream, Transport, TransportKind};

/// JSON-RPC over a Unix domain socket, one JSON document per line.
pub struct IpcTransport {
    path: PathBuf,
    url: String,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl IpcTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            url: path.display().to_string(),
            path,
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for IpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Duplex
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<FrameStream, TransportError> {
        tracing::info!(path = %self.url, "connecting via IPC");
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| TransportError::Ipc(format!("connect to {}: {e}", self.url)))?;
        let (read, write) = stream.into_split();
        *self.writer.lock().await = Some(write);

        let frames = futures::stream::unfold(BufReader::new(read), |mut reader| async move {
            loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => return None,
                    Ok(_) => {
                        let end = line
                            .iter()
                            .rposition(|b| !b.is_ascii_whitespace())
                            .map_or(0, |i| i + 1);
                        let frame = &line[..end];
                        if frame.is_empty() {
                            continue;
                        }
                        return Some((Ok(Bytes::copy_from_slice(frame)), reader));
                    }
                    Err(e) => return Some((Err(TransportError::Ipc(e.to_string())), reader)),
                }
            }
        });
        Ok(Box::pin(frames))
    }

    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::NotConnected)?;
        let written = async {
            writer.write_all(&frame).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        written.map_err(|e| {
            tracing::warn!(path = %self.url, error = %e, "IPC write failed");
            TransportError::Ipc(e.to_string())
        })
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            tracing::debug!(path = %self.url, "closing IPC socket");
            let _ = writer.shutdown().await;
        }
    }
}
