use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

use crate::core::gate::ExchangePermit;
use crate::core::types::IngestionEvent;
use crate::remote::dispatcher::StreamHandle;
use crate::remote::transport::ByteStream;
use crate::stream::framing::{Frame, FramingStrategy};

/// Turns an open response body into ingestion events.
///
/// Events come out in arrival order, every `PartialUpdate` ahead of the
/// single terminal event. Once terminal, the body and the framing carry-over
/// are released, the exchange permit is settled as that event is handed out,
/// and `next_event` returns `None`. After
/// cancellation nothing more is emitted.
pub struct StreamIngestor {
    stream: Option<ByteStream>,
    framing: Box<dyn FramingStrategy>,
    permit: Option<ExchangePermit>,
    cancel: CancellationToken,
    pending: VecDeque<IngestionEvent>,
    accumulated: String,
    finished: bool,
}

impl StreamIngestor {
    #[must_use]
    pub fn consume(handle: StreamHandle, framing: Box<dyn FramingStrategy>) -> Self {
        let (stream, permit, cancel) = handle.into_parts();
        Self {
            stream: Some(stream),
            framing,
            permit,
            cancel,
            pending: VecDeque::new(),
            accumulated: String::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn next_event(&mut self) -> Option<IngestionEvent> {
        loop {
            if self.cancel.is_cancelled() {
                self.release();
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                self.settle_on_delivery(&event);
                return Some(event);
            }
            if self.finished {
                return None;
            }
            let Some(stream) = self.stream.as_mut() else {
                self.finished = true;
                return None;
            };

            let read = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                next = stream.next() => Some(next),
            };

            match read {
                None => {
                    tracing::debug!("Ingestion cancelled");
                    self.release();
                    return None;
                }
                Some(Some(Ok(chunk))) => {
                    let frames = self.framing.decode(&chunk);
                    self.absorb(frames);
                }
                Some(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Response stream failed");
                    self.terminate(IngestionEvent::Failed(e.to_string()));
                }
                Some(None) => {
                    let frames = self.framing.finish();
                    self.absorb(frames);
                    if !self.finished {
                        let final_text = self.accumulated.clone();
                        self.terminate(IngestionEvent::Completed(final_text));
                    }
                }
            }
        }
    }

    /// Lazy event stream over this ingestor.
    pub fn into_stream(self) -> impl Stream<Item = IngestionEvent> + Send {
        stream::unfold(self, |mut ingestor| async move {
            let event = ingestor.next_event().await?;
            Some((event, ingestor))
        })
    }

    fn absorb(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if self.finished {
                break;
            }
            match frame {
                Frame::Fragment(text) if text.is_empty() => {}
                Frame::Fragment(text) => {
                    self.accumulated.push_str(&text);
                    self.pending.push_back(IngestionEvent::PartialUpdate(text));
                }
                Frame::Done => {
                    let final_text = self.accumulated.clone();
                    self.terminate(IngestionEvent::Completed(final_text));
                }
                Frame::Error(detail) => {
                    self.terminate(IngestionEvent::Failed(detail));
                }
            }
        }
    }

    /// The gate stays busy until the terminal event reaches the caller, not
    /// when it is queued behind undelivered partials.
    fn settle_on_delivery(&mut self, event: &IngestionEvent) {
        if let Some(status) = event.terminal_status() {
            if let Some(permit) = self.permit.take() {
                permit.settle(status);
            }
        }
    }

    fn terminate(&mut self, event: IngestionEvent) {
        self.pending.push_back(event);
        self.finished = true;
        self.stream = None;
        self.framing.reset();
    }

    fn release(&mut self) {
        self.pending.clear();
        self.finished = true;
        self.stream = None;
        self.framing.reset();
        self.permit = None;
    }
}

impl std::fmt::Debug for StreamIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIngestor")
            .field("accumulated_len", &self.accumulated.len())
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
