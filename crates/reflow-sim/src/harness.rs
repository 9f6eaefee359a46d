//! Simulation Harness Utilities
//!
//! A small client for driving a [`crate::SimTms`] socket directly from
//! integration tests, recording every frame exchanged so a test can
//! assert on it or dump it for inspection.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use reflow_proto::{InboundFrame, OutboundFrame};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum TraceDirection {
    HostToTms,
    TmsToHost,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum TraceContent {
    Outbound(OutboundFrame),
    Inbound(InboundFrame),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TraceEntry {
    pub timestamp: SystemTime,
    pub direction: TraceDirection,
    pub content: TraceContent,
}

/// A test client that plays the host's side of the wire protocol
/// against a [`crate::SimTms`] socket, recording every frame sent and
/// received.
pub struct SimHost {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    trace: Vec<TraceEntry>,
}

impl SimHost {
    /// Connects to a [`crate::SimTms`] already listening on `socket_path`.
    pub async fn connect(socket_path: &str) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("connecting to simulated TMS at {socket_path}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            trace: Vec::new(),
        })
    }

    /// Sends one outbound (heartbeat) frame.
    pub async fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        let line = serde_json::to_string(&frame).context("encoding outbound frame")? + "\n";
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("writing outbound frame")?;
        self.record_trace(TraceDirection::HostToTms, TraceContent::Outbound(frame));
        Ok(())
    }

    /// Reads the next inbound frame (status or log line).
    pub async fn recv(&mut self) -> Result<InboundFrame> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .await
            .context("reading inbound frame")?;
        anyhow::ensure!(n > 0, "simulated TMS closed the connection");
        let frame: InboundFrame =
            serde_json::from_str(line.trim()).context("parsing inbound frame")?;
        self.record_trace(TraceDirection::TmsToHost, TraceContent::Inbound(frame.clone()));
        Ok(frame)
    }

    fn record_trace(&mut self, direction: TraceDirection, content: TraceContent) {
        self.trace.push(TraceEntry {
            timestamp: SystemTime::now(),
            direction,
            content,
        });
    }

    /// Dumps the recorded trace to a file, for inspection after a test run.
    pub fn dump_trace(&self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "Dumping trace file");
        let mut file = File::create(path).with_context(|| format!("creating {path:?}"))?;
        let json = serde_json::to_string_pretty(&self.trace)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
