//! The pipeline-stage primitive: a per-record transform plus an
//! end-of-stream flush.
//!
//! Every shell-filter specialization (`grep`, `sed`, `head`, `tail`, `sort`,
//! `uniq`, `map`) is a [`Stage`] — a transform that keeps, rewrites, or
//! omits each record, and a flush that may emit buffered records once the
//! upstream ends. A transform or flush error terminates the stage's output
//! with that error; a record is either fully emitted, fully dropped, or the
//! stage fails.

use crate::error::Result;
use crate::record::LineRecord;
use futures::Stream;
use regex::Regex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A single-input/single-output record transform with end-of-stream flush.
pub trait Stage: Send {
    /// Process one record. `Ok(Some(_))` emits, `Ok(None)` omits; relative
    /// order of emitted records is preserved.
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>>;

    /// Emit any buffered records after the upstream has ended.
    ///
    /// Called exactly once. Stages like `tail` and `sort` release their
    /// buffers here.
    fn flush(&mut self) -> Result<Vec<LineRecord>> {
        Ok(Vec::new())
    }
}

/// Any flush-less closure is a stage.
impl<T> Stage for T
where
    T: FnMut(LineRecord) -> Result<Option<LineRecord>> + Send,
{
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        self(record)
    }
}

/// Record stream produced by running a [`Stage`] over an upstream.
pub struct StageStream<S, G> {
    upstream: S,
    stage: G,
    flushed: Option<VecDeque<LineRecord>>,
    failed: bool,
}

impl<S, G> StageStream<S, G> {
    pub fn new(upstream: S, stage: G) -> Self {
        Self {
            upstream,
            stage,
            flushed: None,
            failed: false,
        }
    }
}

impl<S, G> Stream for StageStream<S, G>
where
    S: Stream<Item = Result<LineRecord>> + Unpin,
    G: Stage + Unpin,
{
    type Item = Result<LineRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.failed {
            return Poll::Ready(None);
        }
        loop {
            // Once the upstream has ended, drain the flush output.
            if let Some(flushed) = &mut this.flushed {
                return Poll::Ready(flushed.pop_front().map(Ok));
            }

            match Pin::new(&mut this.upstream).poll_next(cx) {
                Poll::Ready(Some(Ok(record))) => match this.stage.transform(record) {
                    Ok(Some(out)) => return Poll::Ready(Some(Ok(out))),
                    Ok(None) => continue,
                    Err(e) => {
                        this.failed = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    this.failed = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => match this.stage.flush() {
                    Ok(records) => this.flushed = Some(records.into()),
                    Err(e) => {
                        this.failed = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stage implementations
// ---------------------------------------------------------------------------

/// `grep` — keeps records whose text matches the pattern.
pub struct Grep {
    re: Regex,
}

impl Grep {
    pub fn new(re: Regex) -> Self {
        Self { re }
    }
}

impl Stage for Grep {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        Ok(self.re.is_match(&record.text()).then_some(record))
    }
}

/// `sed` — replaces the first pattern match in each record's text.
/// `$1`-style group references in the replacement are expanded.
pub struct Sed {
    re: Regex,
    replacement: String,
}

impl Sed {
    pub fn new(re: Regex, replacement: impl Into<String>) -> Self {
        Self {
            re,
            replacement: replacement.into(),
        }
    }
}

impl Stage for Sed {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        let replaced = {
            let text = record.text();
            match self.re.replace(&text, self.replacement.as_str()) {
                // No match: pass the record through untouched.
                std::borrow::Cow::Borrowed(_) => None,
                std::borrow::Cow::Owned(s) => Some(s),
            }
        };
        Ok(Some(match replaced {
            Some(s) => record.with_text(&s),
            None => record,
        }))
    }
}

/// `head` — passes the first n records, drops the rest. The upstream is
/// still drained to completion.
pub struct Head {
    remaining: u64,
}

impl Head {
    pub fn new(n: u64) -> Self {
        Self { remaining: n }
    }
}

impl Stage for Head {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}

/// `tail` — ring-buffers the last n records, emits them on flush.
pub struct Tail {
    keep: usize,
    buf: VecDeque<LineRecord>,
}

impl Tail {
    pub fn new(n: usize) -> Self {
        Self {
            keep: n,
            buf: VecDeque::with_capacity(n),
        }
    }
}

impl Stage for Tail {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        if self.keep == 0 {
            return Ok(None);
        }
        if self.buf.len() == self.keep {
            self.buf.pop_front();
        }
        self.buf.push_back(record);
        Ok(None)
    }

    fn flush(&mut self) -> Result<Vec<LineRecord>> {
        Ok(std::mem::take(&mut self.buf).into())
    }
}

/// `sort` — buffers the entire input, emits it byte-wise sorted on flush.
/// Intentionally whole-buffer; terminators participate in the comparison.
pub struct Sort {
    buf: Vec<LineRecord>,
}

impl Sort {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Sort {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        self.buf.push(record);
        Ok(None)
    }

    fn flush(&mut self) -> Result<Vec<LineRecord>> {
        let mut out = std::mem::take(&mut self.buf);
        out.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        Ok(out)
    }
}

/// `uniq` — drops records byte-identical to their immediate predecessor.
pub struct Uniq {
    prev: Option<LineRecord>,
}

impl Uniq {
    pub fn new() -> Self {
        Self { prev: None }
    }
}

impl Default for Uniq {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Uniq {
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        if self
            .prev
            .as_ref()
            .is_some_and(|p| p.as_bytes() == record.as_bytes())
        {
            return Ok(None);
        }
        self.prev = Some(record.clone());
        Ok(Some(record))
    }
}

/// `map` — rewrites each record's text through a caller function; `None`
/// drops the record. The record's own terminator is preserved.
pub struct MapFn<F> {
    f: F,
}

impl<F> MapFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Stage for MapFn<F>
where
    F: FnMut(&str) -> Option<String> + Send,
{
    fn transform(&mut self, record: LineRecord) -> Result<Option<LineRecord>> {
        Ok((self.f)(&record.text()).map(|s| record.with_text(&s)))
    }
}
