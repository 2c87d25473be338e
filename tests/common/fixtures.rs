//! Static corpora and input builders used across harnesses.

/// Numbered lines `"1\n".."n\n"` as one contiguous input.
pub fn numbered_lines(n: usize) -> String {
    (1..=n).map(|i| format!("{i}\n")).collect()
}

/// Numbered line texts `["1", …, "n"]` for assertions.
pub fn numbered_texts(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| i.to_string()).collect()
}

/// A small log-like corpus with mixed severities, duplicates, and a blank
/// line — exercises grep/uniq/sort interplay.
pub const CORPUS_LOG: &str = "\
INFO  startup complete\n\
WARN  disk usage at 81%\n\
WARN  disk usage at 81%\n\
ERROR timeout connecting to db\n\
\n\
INFO  retrying\n\
ERROR timeout connecting to db\n";

/// Chapter-structured text for boundary-predicate tests.
pub const CORPUS_CHAPTERS: &str = "\
CHAPTER one\n\
first line\n\
second line\n\
CHAPTER two\n\
third line\n\
CHAPTER three\n\
fourth line\n\
fifth line\n";
