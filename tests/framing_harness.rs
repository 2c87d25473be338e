//! Line framer integration harness.
//!
//! # What this covers
//!
//! - **Chunk-boundary independence**: the same bytes produce the same
//!   records for every chunking, including cuts inside a `\r\n` terminator
//!   (property-tested).
//! - **Round-trip**: concatenating all emitted record bytes reconstructs the
//!   input exactly.
//! - **Terminators**: `\n` and `\r\n` preserved verbatim; a terminator-less
//!   tail becomes one final record.
//! - **Errors**: a mid-stream source error terminates the record stream
//!   with that error; no partial line is emitted.
//!
//! # Running
//!
//! ```sh
//! cargo test --test framing_harness
//! ```

mod common;
use common::*;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use striate::Pipeline;

// ---------------------------------------------------------------------------
// Chunk-boundary independence
// ---------------------------------------------------------------------------

/// Cut `data` at the given positions (normalized into range, sorted).
fn chunk_at(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts
        .iter()
        .map(|c| if data.is_empty() { 0 } else { c % data.len() })
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(data[start..cut].to_vec());
        start = cut;
    }
    chunks.push(data[start..].to_vec());
    chunks
}

async fn frame_chunks(chunks: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    let items: Vec<std::io::Result<bytes::Bytes>> =
        chunks.into_iter().map(|c| Ok(c.into())).collect();
    let records = Pipeline::attach(futures::stream::iter(items))
        .collect()
        .await
        .expect("framing an error-free source cannot fail");
    records.iter().map(|r| r.as_bytes().to_vec()).collect()
}

proptest! {
    /// Concatenating all records reproduces the input, however it is cut.
    #[test]
    fn round_trip_under_arbitrary_chunking(
        data in proptest::collection::vec(
            prop_oneof![Just(b'\n'), Just(b'\r'), any::<u8>()],
            0..256,
        ),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            let records = frame_chunks(chunk_at(&data, &cuts)).await;
            let rejoined: Vec<u8> = records.concat();
            prop_assert_eq!(rejoined, data.clone());

            // Same records as the unchunked framing.
            let whole = frame_chunks(vec![data.clone()]).await;
            prop_assert_eq!(records, whole);
            Ok(())
        })?;
    }
}

#[rstest]
#[case::aligned(&["1\n", "2\n", "3\n"])]
#[case::one_blob(&["1\n2\n3\n"])]
#[case::mid_line(&["1", "\n2\n3", "\n"])]
#[case::byte_at_a_time(&["1", "\n", "2", "\n", "3", "\n"])]
#[tokio::test]
async fn same_records_for_every_chunking(#[case] chunks: &[&str]) {
    let records = pipeline_from_chunks(chunks).collect().await.unwrap();
    assert_eq!(texts(&records), vec!["1", "2", "3"]);
    assert_eq!(concat_bytes(&records), b"1\n2\n3\n");
}

#[tokio::test]
async fn crlf_split_between_cr_and_lf() {
    let records = pipeline_from_chunks(&["a\r", "\nb\r\n"]).collect().await.unwrap();
    assert_eq!(records[0].as_bytes(), b"a\r\n");
    assert_eq!(records[0].terminator(), b"\r\n");
    assert_eq!(records[1].as_bytes(), b"b\r\n");
}

// ---------------------------------------------------------------------------
// Terminators and tails
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unterminated_tail_is_one_final_record() {
    let records = pipeline_from_bytes("a\nb\nc").collect().await.unwrap();
    assert_eq!(texts(&records), vec!["a", "b", "c"]);
    assert_eq!(records[2].terminator(), b"");
    assert_eq!(concat_bytes(&records), b"a\nb\nc");
}

#[tokio::test]
async fn trailing_terminator_means_no_empty_record() {
    let records = pipeline_from_bytes("a\n").collect().await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn blank_lines_are_records() {
    let records = pipeline_from_bytes("\n\nx\n").collect().await.unwrap();
    assert_eq!(texts(&records), vec!["", "", "x"]);
}

#[tokio::test]
async fn empty_source_emits_nothing() {
    let records = pipeline_from_chunks(&[]).collect().await.unwrap();
    assert!(records.is_empty());
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mid_stream_error_terminates_the_pipeline() {
    let (writer, source) = chunked_source();
    writer.send_str("complete\npart");
    writer.fail(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "source reset",
    ));
    writer.close();

    let err = Pipeline::attach(source).collect().await.unwrap_err();
    match err {
        striate::Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[tokio::test]
async fn lines_before_an_error_still_arrive() {
    let (writer, source) = chunked_source();
    writer.send_str("one\ntwo\n");
    writer.fail(std::io::Error::other("boom"));
    writer.close();

    use futures::StreamExt;
    let (seen, err) = Pipeline::attach(source)
        .apply(|mut records| async move {
            let mut seen = Vec::new();
            loop {
                match records.next().await {
                    Some(Ok(r)) => seen.push(r.text().into_owned()),
                    Some(Err(e)) => return (seen, e),
                    None => panic!("stream ended without the expected error"),
                }
            }
        })
        .await;
    assert_eq!(seen, vec!["one", "two"]);
    assert!(matches!(err, striate::Error::Io(_)));
}
