//! The chainable pipeline handle.
//!
//! A [`Pipeline`] wraps exactly one record stream. Every chaining operation
//! takes `self` by value and returns a new handle, so a consumed handle
//! cannot be reused — the "consumed at most once" rule is enforced by the
//! type system rather than by convention. A pipeline's underlying source is
//! exclusively owned; fan-out requires an explicit [`Pipeline::tee`] branch
//! before consumption.

use crate::error::{Error, Result};
use crate::framer::FramedLines;
use crate::partition::{run_divide, Boundary, Mode};
use crate::process::SpawnOptions;
use crate::record::LineRecord;
use crate::sink::OutOptions;
use crate::stage::{Grep, Head, MapFn, Sed, Sort, Stage, StageStream, Tail, Uniq};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Future, Stream, StreamExt};
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

/// A handle over one line-record stream, chainable into stages, sections,
/// external processes, and sinks.
pub struct Pipeline {
    records: BoxStream<'static, Result<LineRecord>>,
}

impl Pipeline {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Wrap an already-framed record stream.
    pub fn from_records<S>(records: S) -> Self
    where
        S: Stream<Item = Result<LineRecord>> + Send + 'static,
    {
        Self {
            records: records.boxed(),
        }
    }

    /// Attach to a chunked byte stream, framing it into line records.
    pub fn attach<S>(source: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Unpin + 'static,
    {
        Self::from_records(FramedLines::new(
            source.map(|item| item.map_err(Error::from)),
        ))
    }

    /// Attach to an async reader (file, socket body, process stdout).
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::attach(ReaderStream::new(Box::pin(reader)))
    }

    /// Read the contents of a file, line by line.
    ///
    /// The open happens lazily on first poll; an open failure terminates the
    /// record stream with that error.
    pub fn cat(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = futures::stream::once(async move {
            match tokio::fs::File::open(&path).await {
                Ok(file) => Self::from_reader(file).records,
                Err(e) => Self::fail(e.into()).records,
            }
        })
        .flatten();
        Self::from_records(records)
    }

    /// A pipeline that terminates immediately with the given error.
    pub fn fail(error: Error) -> Self {
        Self::from_records(futures::stream::once(async move { Err(error) }))
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Pipe through an arbitrary [`Stage`] — the primitive behind every
    /// filter below. Plain `FnMut(LineRecord) -> Result<Option<LineRecord>>`
    /// closures are stages too.
    pub fn stage<G>(self, stage: G) -> Self
    where
        G: Stage + Unpin + 'static,
    {
        Self::from_records(StageStream::new(self.records, stage))
    }

    /// Keep lines whose text matches the pattern.
    pub fn grep(self, re: Regex) -> Self {
        self.stage(Grep::new(re))
    }

    /// Replace the first pattern match in each line.
    pub fn sed(self, re: Regex, replacement: impl Into<String>) -> Self {
        self.stage(Sed::new(re, replacement))
    }

    /// Pass the first `n` lines.
    pub fn head(self, n: u64) -> Self {
        self.stage(Head::new(n))
    }

    /// Pass the last `n` lines (buffered until end-of-input).
    pub fn tail(self, n: usize) -> Self {
        self.stage(Tail::new(n))
    }

    /// Byte-wise sort (buffers the entire input).
    pub fn sort(self) -> Self {
        self.stage(Sort::new())
    }

    /// Drop lines identical to their immediate predecessor.
    pub fn uniq(self) -> Self {
        self.stage(Uniq::new())
    }

    /// Map each line's text; `None` drops the line.
    pub fn map<F>(self, f: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + Unpin + 'static,
    {
        self.stage(MapFn::new(f))
    }

    /// Inject literal bytes before the first line and/or after the last,
    /// then re-frame (the injected bytes may themselves contain newlines).
    pub fn prepost(self, pre: Option<Bytes>, post: Option<Bytes>) -> Self {
        let body = self.records.map(|item| item.map(LineRecord::into_bytes));
        let lead = futures::stream::iter(pre.map(Ok));
        let trail = futures::stream::iter(post.map(Ok));
        Self::from_records(FramedLines::new(lead.chain(body).chain(trail)))
    }

    /// Inject literal bytes before the first line.
    pub fn pre(self, pre: impl Into<Bytes>) -> Self {
        self.prepost(Some(pre.into()), None)
    }

    /// Inject literal bytes after the last line.
    pub fn post(self, post: impl Into<Bytes>) -> Self {
        self.prepost(None, Some(post.into()))
    }

    // -----------------------------------------------------------------------
    // Branching
    // -----------------------------------------------------------------------

    /// Branch the pipeline: `f` receives an identical copy of the record
    /// stream and runs as a background task; the returned pipeline continues
    /// the main chain.
    ///
    /// The branch completion is detached — its errors are logged, not
    /// propagated. An upstream error reaches the main chain unmodified; the
    /// branch sees a summarizing I/O error in its place.
    pub fn tee<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(Pipeline) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (main_tx, main_rx) = mpsc::unbounded_channel::<Result<LineRecord>>();
        let (branch_tx, branch_rx) = mpsc::unbounded_channel::<Result<LineRecord>>();

        let mut upstream = self.records;
        tokio::spawn(async move {
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(record) => {
                        let _ = branch_tx.send(Ok(record.clone()));
                        let _ = main_tx.send(Ok(record));
                    }
                    Err(e) => {
                        let _ = branch_tx
                            .send(Err(std::io::Error::other(format!("tee upstream failed: {e}"))
                                .into()));
                        let _ = main_tx.send(Err(e));
                        return;
                    }
                }
            }
        });

        let branch = Self::from_records(
            tokio_stream_from(branch_rx),
        );
        let completion = f(branch);
        tokio::spawn(async move {
            if let Err(e) = completion.await {
                tracing::warn!(error = %e, "tee branch failed");
            }
        });

        Self::from_records(tokio_stream_from(main_rx))
    }

    /// Hand the raw record stream to caller code.
    pub fn apply<F, R>(self, f: F) -> R
    where
        F: FnOnce(BoxStream<'static, Result<LineRecord>>) -> R,
    {
        f(self.records)
    }

    // -----------------------------------------------------------------------
    // External process filter
    // -----------------------------------------------------------------------

    /// Route the pipeline through an external process: bytes are fed to its
    /// stdin, and its stdout — re-framed — becomes the new pipeline. A
    /// launch failure surfaces as the first item of the returned pipeline,
    /// never synchronously. Stderr is ignored.
    pub fn spawn<I, S>(self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.spawn_with(command, args, SpawnOptions::default())
    }

    /// [`Pipeline::spawn`] with working-directory and environment options.
    pub fn spawn_with<I, S>(
        self,
        command: impl Into<String>,
        args: I,
        options: SpawnOptions,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        crate::process::spawn_filter(
            self.records,
            command.into(),
            args.into_iter().map(Into::into).collect(),
            options,
        )
    }

    // -----------------------------------------------------------------------
    // Sinks
    // -----------------------------------------------------------------------

    /// Write all lines to a file. Resolves once the file is cleanly closed.
    pub async fn out(self, path: impl AsRef<Path>) -> Result<()> {
        self.out_with(path, OutOptions::default()).await
    }

    /// [`Pipeline::out`] with optional pre/post framing bytes. The `post`
    /// bytes are flushed as part of the same shutdown that completes this
    /// future.
    pub async fn out_with(self, path: impl AsRef<Path>, options: OutOptions) -> Result<()> {
        let file = tokio::fs::File::create(path.as_ref()).await?;
        self.write_to(tokio::io::BufWriter::new(file), options).await
    }

    /// Write all lines to any destination. On an upstream error the
    /// destination is dropped without shutdown (forced abort) and the error
    /// propagates unmodified.
    pub async fn write_to<W>(self, dest: W, options: OutOptions) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        crate::sink::write_records(self.records, dest, options).await
    }

    /// Drain the pipeline into memory. Stops at the first error.
    pub async fn collect(mut self) -> Result<Vec<LineRecord>> {
        let mut out = Vec::new();
        while let Some(item) = self.records.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Partitioning
    // -----------------------------------------------------------------------

    /// Split into fixed-size sections of `num` lines each (the last section
    /// may be shorter). The handler is invoked once per section with a fresh
    /// pipeline and the 0-based section index; sections run concurrently
    /// once opened. Resolves after every handler completion settles.
    pub async fn divide<H, Fut>(self, num: u64, handler: H) -> Result<()>
    where
        H: FnMut(Pipeline, usize) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if num == 0 {
            return Err(Error::SectionSize(0));
        }
        self.divide_from(Boundary::every(num), handler).await
    }

    /// Split where the boundary matches; the matching line starts the next
    /// section. The stream's first line always opens section 0.
    pub async fn divide_from<H, Fut>(self, boundary: impl Into<Boundary>, handler: H) -> Result<()>
    where
        H: FnMut(Pipeline, usize) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        run_divide(self.records, Mode::From, boundary.into(), handler).await
    }

    /// Split where the boundary matches; the matching line ends its section.
    pub async fn divide_to<H, Fut>(self, boundary: impl Into<Boundary>, handler: H) -> Result<()>
    where
        H: FnMut(Pipeline, usize) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        run_divide(self.records, Mode::To, boundary.into(), handler).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

fn tokio_stream_from(
    rx: mpsc::UnboundedReceiver<Result<LineRecord>>,
) -> impl Stream<Item = Result<LineRecord>> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
}
