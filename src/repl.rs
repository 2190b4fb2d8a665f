//! Interactive loop
//!
//! Inbound events, input lines and send completions all arrive on one
//! channel and are handled one at a time by `Repl::run`, so the router never
//! sees concurrent mutation.

use crate::command::{Command, HELP};
use crate::config::Config;
use crate::error::{Error, ListenError, ParseError, Result};
use crate::notify::Alerter;
use crate::router::{Dispatch, InboundOutcome, Router, SendCompletion, SendRequest};
use crate::session::{InboundMessage, SessionHandle};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Everything the loop reacts to
#[derive(Debug)]
pub enum LoopEvent {
    Inbound(std::result::Result<InboundMessage, ListenError>),
    ListenClosed,
    Line(String),
    InputClosed,
    InputFailed(std::io::Error),
    Sent(SendCompletion),
}

pub struct Repl<W: Write> {
    router: Router,
    session: Arc<dyn SessionHandle>,
    alerter: Alerter,
    out: W,
    prompt: String,
    error_pause: Duration,
    sends_in_flight: usize,
    deferred: VecDeque<Command>,
    closing: bool,
}

impl<W: Write> Repl<W> {
    pub fn new(router: Router, session: Arc<dyn SessionHandle>, config: &Config, out: W) -> Self {
        Self {
            router,
            session,
            alerter: Alerter::new(config),
            out,
            prompt: config.prompt.clone(),
            error_pause: config.error_pause(),
            sends_in_flight: 0,
            deferred: VecDeque::new(),
            closing: false,
        }
    }

    /// Run until end of input or `quit`, then hand back the output sink.
    ///
    /// Outstanding sends and deferred replies are finished before returning.
    /// Only a read error on `input` ends the loop with an error.
    pub async fn run<R>(mut self, input: R) -> Result<W>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = spawn_listener(self.session.clone(), tx.clone(), self.error_pause);
        let reader = spawn_reader(input, tx.clone());

        self.write_prompt()?;

        let outcome = loop {
            if self.is_finished() {
                break Ok(());
            }
            let Some(event) = rx.recv().await else {
                break Ok(());
            };

            let handled = match event {
                LoopEvent::Inbound(event) => self.on_inbound(event),
                LoopEvent::ListenClosed => {
                    self.emit(&["Inbound message stream closed".to_string()])
                }
                LoopEvent::Line(line) => self.on_line(&line, &tx),
                LoopEvent::InputClosed => {
                    debug!("Input closed");
                    self.closing = true;
                    Ok(())
                }
                LoopEvent::InputFailed(e) => {
                    error!("Input stream failed: {}", e);
                    break Err(Error::Io(e));
                }
                LoopEvent::Sent(completion) => self.on_sent(completion, &tx),
            };
            if let Err(e) = handled {
                break Err(e);
            }
        };

        listener.abort();
        reader.abort();
        outcome.map(|_| self.out)
    }

    fn is_finished(&self) -> bool {
        self.closing && self.sends_in_flight == 0 && self.deferred.is_empty()
    }

    fn on_inbound(&mut self, event: std::result::Result<InboundMessage, ListenError>) -> Result<()> {
        match self.router.handle_inbound(event) {
            Some(InboundOutcome::Notify(notification)) => {
                self.alerter.fire(&notification.alert);
                self.emit(&notification.lines)
            }
            Some(InboundOutcome::Error(message)) => self.emit(&[message]),
            None => Ok(()),
        }
    }

    fn on_line(&mut self, line: &str, tx: &UnboundedSender<LoopEvent>) -> Result<()> {
        if self.closing || line.trim().is_empty() {
            return Ok(());
        }

        match Command::parse(line) {
            Ok(cmd) => {
                if !self.deferred.is_empty() || self.router.must_wait(&cmd) {
                    debug!(?cmd, "Deferring until pending sends complete");
                    self.deferred.push_back(cmd);
                } else {
                    self.execute(cmd, tx)?;
                }
            }
            Err(ParseError::EmptyBody) => debug!("Dropping command with empty body"),
            Err(e @ ParseError::MissingRecipient) => {
                self.emit(&[e.to_string(), HELP.to_string()])?
            }
        }

        self.write_prompt()
    }

    fn execute(&mut self, cmd: Command, tx: &UnboundedSender<LoopEvent>) -> Result<()> {
        match self.router.dispatch(cmd) {
            Ok(Dispatch::Print(lines)) => self.emit(&lines),
            Ok(Dispatch::Send(request)) => {
                self.spawn_send(request, tx);
                Ok(())
            }
            Ok(Dispatch::Quit) => {
                info!("Quit requested");
                self.closing = true;
                Ok(())
            }
            Err(e) => self.emit(&[e.to_string()]),
        }
    }

    fn on_sent(&mut self, completion: SendCompletion, tx: &UnboundedSender<LoopEvent>) -> Result<()> {
        self.sends_in_flight = self.sends_in_flight.saturating_sub(1);

        match self.router.complete(completion) {
            Ok(lines) => self.emit(&lines)?,
            Err(e) => self.emit(&[e.to_string()])?,
        }

        while let Some(cmd) = self.deferred.front() {
            if self.router.must_wait(cmd) {
                break;
            }
            if let Some(cmd) = self.deferred.pop_front() {
                self.execute(cmd, tx)?;
            }
        }
        Ok(())
    }

    fn spawn_send(&mut self, request: SendRequest, tx: &UnboundedSender<LoopEvent>) {
        self.sends_in_flight += 1;
        let session = self.session.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = session.send_message(&request.body, &request.target).await;
            let _ = tx.send(LoopEvent::Sent(SendCompletion { request, result }));
        });
    }

    fn emit(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn write_prompt(&mut self) -> Result<()> {
        write!(self.out, "{}", self.prompt)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Forward inbound events until the stream closes or the loop goes away
fn spawn_listener(
    session: Arc<dyn SessionHandle>,
    tx: UnboundedSender<LoopEvent>,
    error_pause: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match session.next_event().await {
                Some(event) => {
                    let failed = event.is_err();
                    if tx.send(LoopEvent::Inbound(event)).is_err() {
                        return;
                    }
                    // Keep a broken gateway from spinning
                    if failed {
                        tokio::time::sleep(error_pause).await;
                    }
                }
                None => {
                    let _ = tx.send(LoopEvent::ListenClosed);
                    return;
                }
            }
        }
    })
}

fn spawn_reader<R>(input: R, tx: UnboundedSender<LoopEvent>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            let event = match lines.next_line().await {
                Ok(Some(line)) => LoopEvent::Line(line),
                Ok(None) => LoopEvent::InputClosed,
                Err(e) => LoopEvent::InputFailed(e),
            };
            let done = !matches!(event, LoopEvent::Line(_));
            if tx.send(event).is_err() || done {
                return;
            }
        }
    })
}
