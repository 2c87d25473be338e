//! Line framer — reconstructs line records from arbitrarily-chunked bytes.
//!
//! Chunk boundaries carry no meaning: a line may span many chunks, and one
//! chunk may hold many lines. [`FramedLines`] accumulates bytes until a
//! terminator (`\n`, covering `\r\n` as well) completes a record, keeping any
//! partial-line residue across chunks in per-instance state. Concatenating
//! every emitted record's bytes reproduces the input exactly.

use crate::error::Result;
use crate::record::LineRecord;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream adapter turning a chunked byte stream into a [`LineRecord`] stream.
///
/// Applied at every point where a pipeline reconnects to a raw byte
/// producer: the original source and the stdout of a spawned filter process.
pub struct FramedLines<S> {
    source: S,
    buf: BytesMut,
    // Prefix of `buf` already scanned and known to contain no newline.
    scanned: usize,
    done: bool,
}

impl<S> FramedLines<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: BytesMut::new(),
            scanned: 0,
            done: false,
        }
    }
}

impl<S> Stream for FramedLines<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<LineRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            // Emit the next complete line if the buffer holds one.
            if let Some(pos) = this.buf[this.scanned..].iter().position(|&b| b == b'\n') {
                let line = this.buf.split_to(this.scanned + pos + 1).freeze();
                this.scanned = 0;
                return Poll::Ready(Some(Ok(LineRecord::new(line))));
            }
            this.scanned = this.buf.len();

            if this.done {
                if this.buf.is_empty() {
                    return Poll::Ready(None);
                }
                // Terminator-less residue becomes the final record.
                let residue = this.buf.split().freeze();
                this.scanned = 0;
                tracing::trace!(len = residue.len(), "flushing unterminated final line");
                return Poll::Ready(Some(Ok(LineRecord::new(residue))));
            }

            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.buf.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Err(e))) => {
                    // A source error is terminal: drop the residue, the
                    // stream ends with this error.
                    this.done = true;
                    this.buf.clear();
                    this.scanned = 0;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
