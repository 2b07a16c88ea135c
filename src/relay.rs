use std::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::extractor::{ByteStream, ExtractError};

/// Forwards an upstream byte stream to a response body unchanged.
///
/// An upstream error is passed through so the server aborts the response
/// instead of ending it cleanly. Dropping the relay before the upstream
/// finished means the client went away; the upstream connection is closed
/// with it.
pub struct Relay {
    inner: ByteStream,
    label: String,
    sent: u64,
    finished: bool,
}

impl Relay {
    pub fn new(inner: ByteStream, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            sent: 0,
            finished: false,
        }
    }
}

impl Stream for Relay {
    type Item = Result<Bytes, ExtractError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let item = ready!(self.inner.poll_next_unpin(cx));
        match &item {
            Some(Ok(chunk)) => self.sent += chunk.len() as u64,
            Some(Err(e)) => {
                error!(
                    kind = e.kind(),
                    "relay of {} aborted after {} bytes: {e}", self.label, self.sent
                );
                self.finished = true;
            }
            None => {
                info!("download finished: {} ({} bytes)", self.label, self.sent);
                self.finished = true;
            }
        }
        Poll::Ready(item)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "client disconnected from {} after {} bytes, closing upstream",
                self.label, self.sent
            );
        }
    }
}
