//! striate — composable line-oriented pipelines over async byte streams.
//!
//! Shell text filters (`cat`/`grep`/`sed`/`head`/`tail`/`sort`/`uniq`) as
//! chainable stages over an unbounded, possibly infinite, input.
//!
//! # Architecture
//!
//! ```text
//! byte source ──► Framer ──► Stage* ──┬──► Sink
//!                                     ├──► process filter ──► Framer ──► …
//!                                     └──► Partition ──► Section pipelines ──► …
//! ```
//!
//! Raw bytes are framed into [`LineRecord`]s once at the source and again
//! whenever the pipeline reconnects to a raw byte producer (a spawned
//! filter's stdout). Stages transform records one at a time; the partition
//! engine splits one stream into a sequence of bounded section pipelines,
//! each handed to caller code and awaited concurrently. All cross-task
//! communication uses `tokio` channels.
//!
//! # Example
//!
//! ```no_run
//! use regex::Regex;
//! use striate::Pipeline;
//!
//! # async fn demo() -> striate::Result<()> {
//! Pipeline::cat("access.log")
//!     .grep(Regex::new("ERROR")?)
//!     .sed(Regex::new("secret=[^ ]+")?, "secret=***")
//!     .out("errors.log")
//!     .await
//! # }
//! ```

pub mod error;
pub mod framer;
pub mod partition;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod sink;
pub mod stage;

pub use error::{Error, Result};
pub use partition::Boundary;
pub use pipeline::Pipeline;
pub use process::SpawnOptions;
pub use record::LineRecord;
pub use sink::OutOptions;
pub use stage::Stage;
