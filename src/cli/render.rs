use std::io::{self, Write};

use crate::core::transcript::{TranscriptSnapshot, TranscriptStore};
use crate::core::types::{IngestionEvent, Message, Role};

/// Plain-text renderer: streams partial text as it arrives and prints the
/// committed entry once the exchange ends.
pub struct Renderer<W: Write> {
    out: W,
    streamed: bool,
    error: Option<io::Error>,
}

impl<W: Write> Renderer<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out,
            streamed: false,
            error: None,
        }
    }

    /// Event callback for `ChatSession::ask`. Write errors are kept until
    /// `finish` so the exchange itself is not interrupted.
    pub fn on_event(&mut self, event: &IngestionEvent, transcript: &TranscriptStore) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.render_event(event, transcript) {
            self.error = Some(e);
        }
    }

    fn render_event(
        &mut self,
        event: &IngestionEvent,
        transcript: &TranscriptStore,
    ) -> io::Result<()> {
        match event {
            IngestionEvent::PartialUpdate(delta) => {
                self.streamed = true;
                self.out.write_all(delta.as_bytes())?;
            }
            IngestionEvent::Completed(final_text) => {
                if !self.streamed {
                    self.out.write_all(final_text.as_bytes())?;
                }
                writeln!(self.out)?;
            }
            IngestionEvent::Failed(_) => {
                if self.streamed {
                    writeln!(self.out)?;
                }
                let notice = transcript
                    .last_message()
                    .map_or_else(|| transcript.failure_notice(), Message::content);
                writeln!(self.out, "{notice}")?;
            }
        }
        self.out.flush()
    }

    pub fn cancelled(&mut self) -> io::Result<()> {
        if self.streamed {
            writeln!(self.out)?;
        }
        writeln!(self.out, "[cancelled]")?;
        self.out.flush()
    }

    pub fn print_transcript(&mut self, snapshot: &TranscriptSnapshot) -> io::Result<()> {
        for message in &snapshot.messages {
            let label = match message.role() {
                Role::User => "you",
                Role::Assistant => "scholar",
            };
            writeln!(
                self.out,
                "[{}] {label}: {}",
                message.created_at().format("%H:%M:%S"),
                message.content()
            )?;
        }
        if let Some(partial) = &snapshot.partial {
            writeln!(self.out, "scholar (streaming): {partial}")?;
        }
        self.out.flush()
    }

    /// Starts a fresh exchange and reports any write error from the last one.
    pub fn finish(&mut self) -> io::Result<()> {
        self.streamed = false;
        self.error.take().map_or(Ok(()), Err)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(events: &[IngestionEvent]) -> String {
        let mut transcript = TranscriptStore::with_failure_notice("Something went wrong.");
        transcript.submit_user_message("q").unwrap();

        let mut renderer = Renderer::new(Vec::new());
        for event in events {
            transcript.apply_event(event);
            renderer.on_event(event, &transcript);
        }
        renderer.finish().unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_streams_partials_then_newline() {
        let out = render(&[
            IngestionEvent::PartialUpdate("Riba is ".into()),
            IngestionEvent::PartialUpdate("interest.".into()),
            IngestionEvent::Completed("Riba is interest.".into()),
        ]);
        assert_eq!(out, "Riba is interest.\n");
    }

    #[test]
    fn test_completed_without_partials_prints_final_text() {
        let out = render(&[IngestionEvent::Completed("whole".into())]);
        assert_eq!(out, "whole\n");
    }

    #[test]
    fn test_failure_prints_notice_not_detail() {
        let out = render(&[IngestionEvent::Failed("upstream timeout".into())]);
        assert_eq!(out, "Something went wrong.\n");
        assert!(!out.contains("upstream timeout"));
    }

    #[test]
    fn test_cancelled_marker() {
        let mut renderer = Renderer::new(Vec::new());
        renderer.on_event(
            &IngestionEvent::PartialUpdate("half".into()),
            &TranscriptStore::new(),
        );
        renderer.cancelled().unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "half\n[cancelled]\n");
    }

    #[test]
    fn test_print_transcript_labels_roles() {
        let mut transcript = TranscriptStore::new();
        transcript.submit_user_message("What is riba?").unwrap();
        transcript.apply_event(&IngestionEvent::Completed("Interest.".into()));

        let mut renderer = Renderer::new(Vec::new());
        renderer.print_transcript(&transcript.snapshot()).unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(out.contains("you: What is riba?"));
        assert!(out.contains("scholar: Interest."));
        assert!(!out.contains("streaming"));
    }

    #[test]
    fn test_print_transcript_shows_uncommitted_partial() {
        let mut transcript = TranscriptStore::new();
        transcript.submit_user_message("What is zakat?").unwrap();
        transcript.apply_event(&IngestionEvent::PartialUpdate("Zakat is ".into()));

        let mut renderer = Renderer::new(Vec::new());
        renderer.print_transcript(&transcript.snapshot()).unwrap();
        let out = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(out.contains("you: What is zakat?"));
        assert!(out.ends_with("scholar (streaming): Zakat is \n"));
    }
}
