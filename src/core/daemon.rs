//! Tone generator daemon event loop
//!
//! One task owns the [`ToneEngine`] and serializes everything that touches
//! it: remote calls arriving through [`DaemonHandle`]s and the periodic
//! render cycle that feeds every stream's write callback. A tone created by
//! a call becomes audible from the next render cycle on.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::audio::{NullSink, PcmSink, RawFileSink};
use crate::config::DaemonConfig;
use crate::core::engine::ToneEngine;
use crate::protocols::rfc4733::{Arg, Rfc4733};
use crate::{Error, Result};

const REQUEST_QUEUE_DEPTH: usize = 64;

/// Daemon events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    Started,
    Stopped,
    CallCompleted {
        sender: String,
        method: String,
        error: Option<String>,
    },
}

/// A remote call waiting for the event loop
#[derive(Debug)]
pub struct EngineRequest {
    pub sender: String,
    pub method: String,
    pub args: Vec<Arg>,
    pub reply: oneshot::Sender<Result<()>>,
}

/// Cloneable entry point for submitting remote calls to a running daemon
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    request_tx: mpsc::Sender<EngineRequest>,
}

impl DaemonHandle {
    pub async fn call(&self, sender: &str, method: &str, args: Vec<Arg>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        let request = EngineRequest {
            sender: sender.to_string(),
            method: method.to_string(),
            args,
            reply,
        };

        self.request_tx
            .send(request)
            .await
            .map_err(|_| Error::internal("tone daemon is not running"))?;

        response
            .await
            .map_err(|_| Error::internal("tone daemon dropped the request"))?
    }
}

pub struct ToneDaemon {
    config: DaemonConfig,
    engine: ToneEngine,
    dispatcher: Rfc4733,
    sink: Box<dyn PcmSink>,

    request_tx: mpsc::Sender<EngineRequest>,
    request_rx: mpsc::Receiver<EngineRequest>,

    event_tx: mpsc::UnboundedSender<DaemonEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<DaemonEvent>>,
}

impl ToneDaemon {
    pub fn new(config: DaemonConfig) -> Result<Self> {
        let engine = ToneEngine::from_config(&config)?;

        let sink: Box<dyn PcmSink> = match &config.audio.output_dir {
            Some(dir) => Box::new(RawFileSink::new(dir)?),
            None => Box::new(NullSink),
        };

        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            engine,
            dispatcher: Rfc4733::new(),
            sink,
            request_tx,
            request_rx,
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    pub fn with_sink(mut self, sink: Box<dyn PcmSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            request_tx: self.request_tx.clone(),
        }
    }

    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<DaemonEvent>> {
        self.event_rx.take()
    }

    pub fn engine(&self) -> &ToneEngine {
        &self.engine
    }

    pub fn dispatcher(&self) -> &Rfc4733 {
        &self.dispatcher
    }

    /// Serve calls and render audio until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let frames = self.config.frames_per_buffer();
        let period = Duration::from_millis(self.config.audio.buffer_ms as u64);
        let mut ticker = tokio::time::interval(period);
        tokio::pin!(shutdown);

        info!(
            "Tone daemon running: {} frames every {} ms",
            frames, self.config.audio.buffer_ms
        );
        let _ = self.event_tx.send(DaemonEvent::Started);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Tone daemon shutting down");
                    break;
                }
                Some(request) = self.request_rx.recv() => {
                    self.handle_request(request);
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.engine.render(frames, self.sink.as_mut()) {
                        error!("Render cycle failed: {}", e);
                    }
                }
            }
        }

        if let Err(e) = self.sink.flush() {
            warn!("Failed to flush audio output: {}", e);
        }
        let _ = self.event_tx.send(DaemonEvent::Stopped);
        Ok(())
    }

    fn handle_request(&mut self, request: EngineRequest) {
        debug!("{} from '{}' {:?}", request.method, request.sender, request.args);

        let result = self
            .dispatcher
            .call(&mut self.engine, &request.sender, &request.method, &request.args);

        let _ = self.event_tx.send(DaemonEvent::CallCompleted {
            sender: request.sender,
            method: request.method,
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        if request.reply.send(result).is_err() {
            debug!("Caller went away before the reply");
        }
    }
}
