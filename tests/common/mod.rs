//! Shared test utilities for striate integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. All helpers are deterministic: chunk boundaries and
//! section contents are fully caller-controlled.

#![allow(dead_code)]

pub mod chunked;
pub mod fixtures;

pub use chunked::*;
pub use fixtures::*;

use std::sync::{Arc, Mutex};
use striate::{LineRecord, Pipeline};

/// Record texts (terminators stripped), for readable assertions.
pub fn texts(records: &[LineRecord]) -> Vec<String> {
    records.iter().map(|r| r.text().into_owned()).collect()
}

/// Full record bytes concatenated — the round-trip view of a pipeline.
pub fn concat_bytes(records: &[LineRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for r in records {
        out.extend_from_slice(r.as_bytes());
    }
    out
}

/// What the divide harnesses collect per section: `(index, line texts)`.
pub type SectionLog = Arc<Mutex<Vec<(usize, Vec<String>)>>>;

pub fn section_log() -> SectionLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A divide handler that drains each section into the log. Sections run
/// concurrently, so entries are sorted by index before assertion.
pub fn collecting_handler(
    log: SectionLog,
) -> impl FnMut(Pipeline, usize) -> futures::future::BoxFuture<'static, striate::Result<()>> {
    move |section, index| {
        let log = log.clone();
        Box::pin(async move {
            let records = section.collect().await?;
            log.lock().unwrap().push((index, texts(&records)));
            Ok(())
        })
    }
}

/// Sections from the log, in index order.
pub fn sections(log: &SectionLog) -> Vec<(usize, Vec<String>)> {
    let mut entries = log.lock().unwrap().clone();
    entries.sort_by_key(|(index, _)| *index);
    entries
}
