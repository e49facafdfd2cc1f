//! JSON-lines control service
//!
//! Each line a client sends is one remote call:
//! `{"sender":"...","method":"StartEventTone","args":[66,0,0]}`. Each call is
//! answered with one line, `{"ok":true}` or `{"ok":false,"error":"..."}`.
//! Without an explicit `sender` the peer address identifies the caller.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ControlConfig;
use crate::core::DaemonHandle;
use crate::protocols::rfc4733::Arg;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

pub struct ControlService {
    config: ControlConfig,
    handle: DaemonHandle,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl ControlService {
    pub fn new(config: ControlConfig, handle: DaemonHandle) -> Self {
        Self {
            config,
            handle,
            local_addr: None,
            task: None,
        }
    }

    /// Bind the listener and start accepting clients. Returns the bound
    /// address, which differs from the configured one when port 0 is used.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.task.is_some() {
            return Err(Error::internal("control service already running"));
        }

        let bind = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind).await?;
        let local_addr = listener.local_addr()?;
        info!("Control service listening on {}", local_addr);

        let handle = self.handle.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("Control client connected from {}", peer);
                        let handle = handle.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, peer, handle).await {
                                warn!("Control connection {} failed: {}", peer, e);
                            }
                            debug!("Control client {} disconnected", peer);
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept control connection: {}", e);
                    }
                }
            }
        }));

        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Control service stopped");
        }
        self.local_addr = None;
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for ControlService {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handle: DaemonHandle,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = process_line(&line, peer, &handle).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }

    Ok(())
}

async fn process_line(line: &str, peer: SocketAddr, handle: &DaemonHandle) -> ControlResponse {
    let request: ControlRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed control request from {}: {}", peer, e);
            return ControlResponse::failure(format!("malformed request: {}", e));
        }
    };

    let sender = request.sender.unwrap_or_else(|| peer.to_string());
    match handle.call(&sender, &request.method, request.args).await {
        Ok(()) => ControlResponse::success(),
        Err(e) => ControlResponse::failure(e.to_string()),
    }
}
