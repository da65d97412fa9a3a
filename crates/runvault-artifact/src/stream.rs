//! Readable artifact content

use crate::{Result, StorageError};
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Single-reader byte stream over one artifact.
///
/// The stream holds the backend connection or file descriptor until it is
/// dropped or [`close`](ArtifactStream::close)d. Polling a closed stream
/// yields [`StorageError::StreamClosed`] straight away.
pub struct ArtifactStream {
    path: String,
    inner: Option<BoxStream<'static, Result<Bytes>>>,
}

impl ArtifactStream {
    pub fn new<S>(path: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            path: path.into(),
            inner: Some(stream.boxed()),
        }
    }

    /// Path of the artifact relative to its root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Release the underlying backend resource
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::trace!(path = %self.path, "Artifact stream closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Read the remaining content into memory and release the stream
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        self.close();
        Ok(buffer.freeze())
    }
}

impl Stream for ArtifactStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut() {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(Some(Err(StorageError::StreamClosed(this.path.clone())))),
        }
    }
}

impl fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
