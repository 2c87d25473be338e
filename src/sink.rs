//! Sink adapter — terminates a pipeline into an async destination.

use crate::error::Result;
use crate::record::LineRecord;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Optional framing bytes written around the pipeline content.
#[derive(Debug, Default, Clone)]
pub struct OutOptions {
    /// Written before the first record.
    pub pre: Option<Bytes>,
    /// Written after the last record, flushed as part of the destination's
    /// close.
    pub post: Option<Bytes>,
}

impl OutOptions {
    pub fn pre(mut self, pre: impl Into<Bytes>) -> Self {
        self.pre = Some(pre.into());
        self
    }

    pub fn post(mut self, post: impl Into<Bytes>) -> Self {
        self.post = Some(post.into());
        self
    }
}

/// Drain a record stream into a destination.
///
/// Resolves `Ok` only after the suffix (if any) is written and the
/// destination reports a clean shutdown. An upstream error aborts: the
/// destination is dropped without shutdown and the error propagates
/// unmodified. A destination write/shutdown error propagates the same way.
pub(crate) async fn write_records<W>(
    mut records: BoxStream<'static, Result<LineRecord>>,
    mut dest: W,
    options: OutOptions,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if let Some(pre) = &options.pre {
        dest.write_all(pre).await?;
    }
    while let Some(item) = records.next().await {
        match item {
            Ok(record) => dest.write_all(record.as_bytes()).await?,
            Err(e) => {
                tracing::debug!(error = %e, "aborting sink on upstream error");
                drop(dest);
                return Err(e);
            }
        }
    }
    // The suffix and the close belong to one operation: both must succeed
    // before the completion resolves.
    if let Some(post) = &options.post {
        dest.write_all(post).await?;
    }
    dest.shutdown().await?;
    Ok(())
}
