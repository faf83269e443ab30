use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::AppConfig;
use crate::core::{ChatSession, ExchangeError, ExchangeOptions, ExchangeOutcome, Result};
use crate::remote::{Endpoint, HttpTransport, RequestDispatcher};

use super::render::Renderer;

pub fn build_session(config: &AppConfig) -> Result<ChatSession> {
    let endpoint =
        Endpoint::parse(config.endpoint()).map_err(|e| ExchangeError::Config(e.to_string()))?;
    let transport = HttpTransport::with_http_config(endpoint, config.http_config())?;
    let dispatcher =
        RequestDispatcher::new(Arc::new(transport)).with_prompt_key(config.prompt_key());
    Ok(ChatSession::new(dispatcher, config.session_config()))
}

/// Routes Ctrl-C for the whole process. While an exchange runs, an interrupt
/// cancels it; otherwise it asks the caller to stop.
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    current: Arc<Mutex<Option<CancellationToken>>>,
    quit: CancellationToken,
}

impl Interrupts {
    /// Installs the Ctrl-C listener. Once installed it owns SIGINT for the
    /// rest of the process, so every interrupt goes through `interrupt`.
    #[must_use]
    pub fn listen() -> Self {
        let interrupts = Self::default();
        let routed = interrupts.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                if !routed.interrupt() {
                    return;
                }
            }
        });
        interrupts
    }

    /// Returns `true` when an exchange was cancelled, `false` when nothing was
    /// running and a stop was requested instead.
    pub fn interrupt(&self) -> bool {
        if let Some(token) = self.current.lock().as_ref() {
            tracing::info!("Interrupted");
            token.cancel();
            return true;
        }
        self.quit.cancel();
        false
    }

    pub async fn quit_requested(&self) {
        self.quit.cancelled().await;
    }

    #[must_use]
    pub fn is_quit_requested(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Registers a fresh exchange token, cancelled by an interrupt or once
    /// `timeout` elapses. Dropping the scope unregisters it.
    fn begin(&self, timeout: Option<Duration>) -> (CancellationToken, ExchangeScope) {
        let cancel = CancellationToken::new();
        *self.current.lock() = Some(cancel.clone());

        if let Some(limit) = timeout {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(limit) => {
                        tracing::warn!(?limit, "Exchange deadline reached");
                        token.cancel();
                    }
                }
            });
        }

        let scope = ExchangeScope {
            current: Arc::clone(&self.current),
            _stop_deadline: cancel.clone().drop_guard(),
        };
        (cancel, scope)
    }
}

struct ExchangeScope {
    current: Arc<Mutex<Option<CancellationToken>>>,
    _stop_deadline: DropGuard,
}

impl Drop for ExchangeScope {
    fn drop(&mut self) {
        self.current.lock().take();
    }
}

async fn exchange<W: Write>(
    session: &mut ChatSession,
    renderer: &mut Renderer<W>,
    interrupts: &Interrupts,
    prompt: String,
    options: ExchangeOptions,
    timeout: Option<Duration>,
) -> Result<ExchangeOutcome> {
    let (cancel, _scope) = interrupts.begin(timeout);
    let outcome = session
        .ask(prompt, options, cancel, |event, transcript| {
            renderer.on_event(event, transcript);
        })
        .await?;

    if outcome == ExchangeOutcome::Cancelled {
        renderer.cancelled()?;
    }
    renderer.finish()?;
    Ok(outcome)
}

/// One-shot question. With `json`, nothing streams and the transcript is
/// printed once the exchange ends.
pub async fn run_ask(
    session: &mut ChatSession,
    prompt: String,
    options: ExchangeOptions,
    timeout: Option<Duration>,
    json: bool,
) -> Result<ExchangeOutcome> {
    let interrupts = Interrupts::listen();
    if json {
        let mut renderer = Renderer::new(io::sink());
        let outcome =
            exchange(session, &mut renderer, &interrupts, prompt, options, timeout).await?;
        let transcript = serde_json::to_string_pretty(&session.transcript().snapshot().messages)?;
        println!("{transcript}");
        return Ok(outcome);
    }

    let mut renderer = Renderer::new(io::stdout());
    exchange(session, &mut renderer, &interrupts, prompt, options, timeout).await
}

/// Reads stdin on a plain thread so a pending read never holds up runtime
/// shutdown after an idle Ctrl-C.
fn stdin_lines() -> ReceiverStream<io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    ReceiverStream::new(rx)
}

/// Interactive loop. Ctrl-C cancels the answer being streamed; at the idle
/// prompt it quits. Returns `true` when ended by Ctrl-C.
pub async fn run_chat(
    session: &mut ChatSession,
    options: ExchangeOptions,
    timeout: Option<Duration>,
) -> Result<bool> {
    let interrupts = Interrupts::listen();
    let mut renderer = Renderer::new(io::stdout());
    let mut lines = stdin_lines();

    println!("Ask a question. /history reprints the conversation, /exit quits.");
    loop {
        print!("> ");
        io::stdout().flush()?;

        let next = tokio::select! {
            () = interrupts.quit_requested() => None,
            line = lines.next() => line,
        };
        let Some(line) = next else {
            println!();
            break;
        };
        let line = line?;

        match line.trim() {
            "" => {}
            "/exit" | "/quit" => break,
            "/history" => renderer.print_transcript(&session.transcript().snapshot())?,
            _ => {
                let result = exchange(
                    session,
                    &mut renderer,
                    &interrupts,
                    line,
                    options.clone(),
                    timeout,
                )
                .await;
                match result {
                    Ok(_) => {}
                    Err(e @ (ExchangeError::Validation(_) | ExchangeError::ConcurrentRequest)) => {
                        eprintln!("✗ {e}");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(interrupts.is_quit_requested())
}
