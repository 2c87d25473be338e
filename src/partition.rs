//! Partition engine — splits one record stream into a temporally ordered
//! sequence of independently consumed bounded sections.
//!
//! The hard part is demand bridging: records arrive whenever the upstream
//! produces them, while each section is consumed at its own pace. The engine
//! owns a session-scoped mediator — a FIFO of undelivered records plus a
//! demand counter bounded to one outstanding pull — and brokers between the
//! two sides without blocking either:
//!
//! - record arrival with outstanding demand delivers immediately (applying
//!   boundary logic); otherwise the record is enqueued;
//! - a section pull with a non-empty FIFO delivers the oldest record;
//!   otherwise demand is registered and delivery deferred;
//! - end-of-input with outstanding demand closes the active section at once;
//!   otherwise the close waits for the next pull;
//! - the stream's first record counts as an implicit pending pull, so
//!   section 0 opens without the handler pulling first.
//!
//! Exactly one section is active at any instant, records are delivered in
//! strict arrival order, and each record lands in exactly one section.
//! Handlers run concurrently as spawned tasks once their section opens; the
//! overall completion settles only after every handler completion has
//! settled, and is never cancelled mid-flight by a failing sibling.

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::record::LineRecord;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Where a section boundary sits relative to the matching record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// The matching record becomes the first record of the next section.
    From,
    /// The matching record becomes the last record of its section.
    To,
}

/// Caller-supplied rule determining where one section ends and the next
/// begins.
pub enum Boundary {
    /// Fires when the record text matches the pattern.
    Pattern(regex::Regex),
    /// Fires when the callback returns true. The count is the number of
    /// records already appended to the active section (`divide_from`
    /// evaluates before append, `divide_to` after).
    When(Box<dyn FnMut(&str, u64) -> bool + Send>),
}

impl Boundary {
    /// Boundary matching record text against a regex pattern.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Self::Pattern(regex::Regex::new(pattern)?))
    }

    /// Boundary driven by a `(text, count)` callback.
    pub fn when(f: impl FnMut(&str, u64) -> bool + Send + 'static) -> Self {
        Self::When(Box::new(f))
    }

    /// Fixed-size sections: fires once `num` records have been appended.
    pub(crate) fn every(num: u64) -> Self {
        Self::when(move |_, count| count % num == 0)
    }

    fn fires(&mut self, record: &LineRecord, count: u64) -> bool {
        match self {
            Boundary::Pattern(re) => re.is_match(&record.text()),
            Boundary::When(f) => f(&record.text(), count),
        }
    }
}

impl From<regex::Regex> for Boundary {
    fn from(re: regex::Regex) -> Self {
        Self::Pattern(re)
    }
}

impl std::fmt::Debug for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Boundary::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Boundary::When(_) => f.debug_tuple("When").field(&"<fn>").finish(),
        }
    }
}

/// What the engine pushes into a section's channel.
enum Delivery {
    Record(LineRecord),
    /// End-of-section: the boundary fired or the upstream ended.
    End,
}

/// The pull side of one section: a record stream whose empty polls register
/// demand with the engine. At most one demand signal is outstanding per
/// section; it is re-armed only after a delivery.
struct SectionStream {
    rx: mpsc::UnboundedReceiver<Delivery>,
    demand: mpsc::UnboundedSender<()>,
    requested: bool,
}

impl Stream for SectionStream {
    type Item = Result<LineRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Delivery::Record(record))) => {
                this.requested = false;
                Poll::Ready(Some(Ok(record)))
            }
            Poll::Ready(Some(Delivery::End)) | Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => {
                if !this.requested {
                    this.requested = true;
                    // Engine gone means the session already ended; our
                    // channel still holds everything owed to us.
                    let _ = this.demand.send(());
                }
                Poll::Pending
            }
        }
    }
}

/// Per-invocation session state. Single-owner: only the engine loop touches
/// it, so no locking is needed around the FIFO or the demand counter.
struct Session<H> {
    mode: Mode,
    boundary: Boundary,
    handler: H,
    fifo: VecDeque<LineRecord>,
    /// Outstanding pull requests, bounded to 0 or 1.
    demand: u8,
    eos: bool,
    /// The stream's first record carries an implicit pull request.
    first: bool,
    active: Option<mpsc::UnboundedSender<Delivery>>,
    /// Records appended to the active section so far.
    appended: u64,
    /// Next section index, starting at 0.
    index: usize,
    completions: JoinSet<Result<()>>,
    demand_tx: mpsc::UnboundedSender<()>,
}

impl<H, Fut> Session<H>
where
    H: FnMut(Pipeline, usize) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    /// Open the next section and invoke the handler for it. The handler's
    /// returned completion is collected; it is awaited only after
    /// end-of-input.
    fn open(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let section = SectionStream {
            rx,
            demand: self.demand_tx.clone(),
            requested: false,
        };
        tracing::debug!(index = self.index, "section opened");
        let pipeline = Pipeline::from_records(section);
        self.completions.spawn((self.handler)(pipeline, self.index));
        self.index += 1;
        self.appended = 0;
        self.active = Some(tx);
    }

    /// Signal end-of-section to the active section, if any.
    fn close(&mut self) {
        if let Some(tx) = self.active.take() {
            tracing::debug!(index = self.index - 1, "section closed");
            let _ = tx.send(Delivery::End);
        }
    }

    /// Deliver one record to the section it belongs to, applying boundary
    /// logic. Consumes one unit of demand; may re-arm demand itself (lazy
    /// open after a `To` boundary, or a dropped consumer).
    fn deliver(&mut self, record: LineRecord) {
        match &self.active {
            None => self.open(),
            Some(_)
                if self.mode == Mode::From && self.boundary.fires(&record, self.appended) =>
            {
                self.close();
                self.open();
            }
            Some(_) => {}
        }

        let closes_after =
            self.mode == Mode::To && self.boundary.fires(&record, self.appended + 1);

        if let Some(tx) = &self.active {
            if tx.send(Delivery::Record(record)).is_err() {
                // Consumer dropped its section without draining it. Nobody
                // will pull on its behalf again, so synthesize demand to
                // keep the session draining toward the next boundary.
                tracing::debug!("section consumer dropped; synthesizing demand");
                self.demand = 1;
            }
        }
        self.appended += 1;

        if closes_after {
            self.close();
            // The next section opens lazily with the next record; arm an
            // implicit pull so that record is delivered without the (not
            // yet existing) consumer having to ask. A stream ending exactly
            // on the boundary therefore produces no empty trailing section.
            self.demand = 1;
        }
    }

    /// Deliver buffered records while demand is available. A section whose
    /// consumer is gone can no longer pull, so demand is synthesized for it
    /// to keep the session moving.
    fn drain(&mut self) {
        loop {
            if self.demand == 0
                && !self.fifo.is_empty()
                && self.active.as_ref().is_some_and(|tx| tx.is_closed())
            {
                self.demand = 1;
            }
            if self.demand == 0 {
                break;
            }
            match self.fifo.pop_front() {
                Some(record) => {
                    self.demand -= 1;
                    self.deliver(record);
                }
                None => break,
            }
        }
    }

    /// True once nothing can advance the session any further: the upstream
    /// has ended, the FIFO is drained, and either a pull is already waiting
    /// (so the deferred close can fire now) or no live consumer remains to
    /// ever pull again.
    fn finished(&self) -> bool {
        self.eos
            && self.fifo.is_empty()
            && (self.demand > 0 || self.active.as_ref().map_or(true, |tx| tx.is_closed()))
    }
}

/// Run one partition session to completion.
///
/// Resolves `Ok` only after (a) upstream end-of-input, (b) the final section
/// closed, and (c) every handler completion settled `Ok`. On failure it
/// still joins every in-flight completion — sibling sections are never
/// cancelled — then reports the first error observed, with a mid-stream
/// source error taking precedence.
pub(crate) async fn run_divide<H, Fut>(
    mut upstream: BoxStream<'static, Result<LineRecord>>,
    mode: Mode,
    boundary: Boundary,
    handler: H,
) -> Result<()>
where
    H: FnMut(Pipeline, usize) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (demand_tx, mut demand_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        mode,
        boundary,
        handler,
        fifo: VecDeque::new(),
        demand: 0,
        eos: false,
        first: true,
        active: None,
        appended: 0,
        index: 0,
        completions: JoinSet::new(),
        demand_tx,
    };

    let upstream_result: Result<()> = loop {
        // Cloned so the closed-watch below can hold it across the select
        // without borrowing the session. Sender clones do not keep the
        // channel open; `closed()` tracks the receiving half alone.
        let active_tx = session.active.clone();
        tokio::select! {
            biased;

            // A section pulled: serve from the FIFO, close out on a drained
            // end-of-input, or register the demand for the next arrival.
            _ = demand_rx.recv() => {
                match session.fifo.pop_front() {
                    Some(record) => {
                        session.deliver(record);
                        session.drain();
                    }
                    None if session.eos => {
                        session.close();
                        break Ok(());
                    }
                    None => session.demand = 1,
                }
                if session.finished() {
                    session.close();
                    break Ok(());
                }
            }

            // After end-of-input the arrival branch is disabled and a
            // consumer dropping its section sends nothing, so its channel
            // closing must itself wake the loop and count as a pull.
            _ = consumer_gone(&active_tx), if session.eos => {
                session.drain();
                if session.finished() {
                    session.close();
                    break Ok(());
                }
            }

            // Upstream arrival, error, or end-of-input.
            item = upstream.next(), if !session.eos => match item {
                Some(Ok(record)) => {
                    if session.first {
                        session.first = false;
                        session.demand = 1;
                    }
                    session.fifo.push_back(record);
                    session.drain();
                }
                Some(Err(e)) => {
                    session.close();
                    break Err(e);
                }
                None => {
                    session.eos = true;
                    session.drain();
                    if session.finished() {
                        session.close();
                        break Ok(());
                    }
                }
            },
        }
    };

    // Join every handler completion before settling; a failing section does
    // not cancel its siblings.
    let mut first_err = upstream_result.err();
    while let Some(joined) = session.completions.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "section handler failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
            Err(join_err) => {
                if first_err.is_none() {
                    first_err = Some(Error::Handler(join_err.to_string()));
                }
            }
        }
    }
    match first_err {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

/// Resolves once the active section's receiving half is dropped; pends
/// forever while no section is open.
async fn consumer_gone(tx: &Option<mpsc::UnboundedSender<Delivery>>) {
    match tx {
        Some(tx) => tx.closed().await,
        None => std::future::pending::<()>().await,
    }
}
