//! ChunkedSource — a byte-chunk stream with caller-controlled chunking.
//!
//! Lets harnesses hand a pipeline its input in arbitrary chunks, including
//! chunks that split a line (or a `\r\n` terminator) down the middle, and
//! inject a mid-stream I/O error. The pipeline under test must behave
//! identically for every chunking of the same bytes.

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use striate::Pipeline;
use tokio::sync::mpsc;

/// Handle for pushing chunks into a [`ChunkedSource`].
pub struct ChunkedSourceWriter {
    tx: mpsc::UnboundedSender<std::io::Result<Bytes>>,
}

impl ChunkedSourceWriter {
    /// Send one raw chunk, cut wherever the test wants.
    pub fn send_chunk(&self, chunk: impl Into<Bytes>) {
        let _ = self.tx.send(Ok(chunk.into()));
    }

    /// Send a string as a single chunk.
    pub fn send_str(&self, s: impl Into<String>) {
        self.send_chunk(Bytes::from(s.into()));
    }

    /// Fail the source mid-stream.
    pub fn fail(&self, error: std::io::Error) {
        let _ = self.tx.send(Err(error));
    }

    /// Close the source, producing end-of-input.
    pub fn close(self) {
        // tx is dropped, closing the channel.
    }
}

/// A byte-chunk stream fed by a [`ChunkedSourceWriter`].
pub struct ChunkedSource {
    rx: mpsc::UnboundedReceiver<std::io::Result<Bytes>>,
}

impl Stream for ChunkedSource {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Create a linked writer/source pair.
pub fn chunked_source() -> (ChunkedSourceWriter, ChunkedSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChunkedSourceWriter { tx }, ChunkedSource { rx })
}

/// A pipeline over fixed chunks, closed after the last one.
pub fn pipeline_from_chunks(chunks: &[&str]) -> Pipeline {
    let items: Vec<std::io::Result<Bytes>> = chunks
        .iter()
        .map(|c| Ok(Bytes::from(c.to_string())))
        .collect();
    Pipeline::attach(futures::stream::iter(items))
}

/// A pipeline over one contiguous byte blob.
pub fn pipeline_from_bytes(bytes: impl Into<Bytes>) -> Pipeline {
    let items: Vec<std::io::Result<Bytes>> = vec![Ok(bytes.into())];
    Pipeline::attach(futures::stream::iter(items))
}
