// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read all content from an async reader into a Vec<u8>
/// WARNING: This loads the entire object into memory. Only use for small
/// objects or in tests.
pub async fn read_all_to_vec(mut reader: Pin<Box<dyn AsyncRead + Send>>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    _ = reader.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Write `content` and commit it by shutting the writer down
pub async fn write_all_and_commit(
    mut writer: Pin<Box<dyn AsyncWrite + Send>>,
    content: &[u8],
) -> io::Result<()> {
    writer.write_all(content).await?;
    writer.shutdown().await
}

type Commit = Box<dyn FnOnce(Vec<u8>) -> BoxFuture<'static, io::Result<()>> + Send>;

/// A buffering async writer that hands its content to a commit closure on shutdown
///
/// Nothing reaches the backend until `shutdown` completes; dropping the writer
/// discards the buffer.
pub struct BufferedWriter {
    buffer: Vec<u8>,
    commit: Option<Commit>,
    pending: Option<BoxFuture<'static, io::Result<()>>>,
    closed: bool,
}

impl BufferedWriter {
    pub fn new<F, Fut>(commit_fn: F) -> Self
    where
        F: FnOnce(Vec<u8>) -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
    {
        let commit: Commit = Box::new(move |buffer| commit_fn(buffer).boxed());
        Self {
            buffer: Vec::new(),
            commit: Some(commit),
            pending: None,
            closed: false,
        }
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "writer already shut down")
    }
}

impl AsyncWrite for BufferedWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.closed || this.pending.is_some() {
            return Poll::Ready(Err(Self::closed_error()));
        }
        this.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.pending.is_none() {
            match this.commit.take() {
                Some(commit) => {
                    let buffer = std::mem::take(&mut this.buffer);
                    this.pending = Some(commit(buffer));
                }
                // Already committed
                None => return Poll::Ready(Ok(())),
            }
        }

        let Some(pending) = this.pending.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        match pending.as_mut().poll(cx) {
            Poll::Ready(result) => {
                this.pending = None;
                this.closed = true;
                Poll::Ready(result)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_commit_on_shutdown() {
        let committed = Arc::new(Mutex::new(None));
        let sink = committed.clone();
        let mut writer = BufferedWriter::new(move |buffer| async move {
            *sink.lock().expect("lock") = Some(buffer);
            Ok(())
        });

        writer.write_all(b"hello ").await.expect("write");
        writer.write_all(b"world").await.expect("write");
        assert!(committed.lock().expect("lock").is_none());

        writer.shutdown().await.expect("commit");
        assert_eq!(
            committed.lock().expect("lock").as_deref(),
            Some(&b"hello world"[..])
        );

        assert!(writer.write_all(b"late").await.is_err());
        writer.shutdown().await.expect("second shutdown is a no-op");
    }

    #[tokio::test]
    async fn test_commit_error_propagates() {
        let mut writer = BufferedWriter::new(|_| async {
            Err(io::Error::other("rejected"))
        });
        writer.write_all(b"x").await.expect("buffered");
        let err = writer.shutdown().await.expect_err("commit fails");
        assert_eq!(err.to_string(), "rejected");
    }

    #[tokio::test]
    async fn test_read_helpers() {
        let reader: Pin<Box<dyn AsyncRead + Send>> =
            Box::pin(std::io::Cursor::new(b"abc".to_vec()));
        assert_eq!(read_all_to_vec(reader).await.expect("read"), b"abc");
    }
}
