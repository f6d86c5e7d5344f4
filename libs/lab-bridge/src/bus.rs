//! Best-effort event publisher for the message bus.
//!
//! The bus client is async; harness call sites are not. Each live handle
//! owns a private current-thread runtime that is driven with `block_on`
//! for every call and lives as long as the handle does.
//!
//! `EventPublisher` takes `&mut self`: it is meant to be driven from one
//! thread per sweep. Sharing it across threads needs external locking.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio::sync::Notify;

use crate::config::BridgeConfig;
use crate::envelope::make_envelope;
use crate::error::DependencyError;

pub const TOPIC_STARTED: &str = "llama.benchmark.started.v1";
pub const TOPIC_CELL: &str = "llama.benchmark.cell.v1";
pub const TOPIC_COMPLETED: &str = "llama.benchmark.completed.v1";

// ═══════════════════════════════════════════════════════════════
//  Adapter traits
// ═══════════════════════════════════════════════════════════════

/// A connected bus handle with blocking semantics.
pub trait BusClient {
    fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), DependencyError>;

    /// Block until the server has acknowledged everything sent so far.
    fn flush(&mut self) -> Result<(), DependencyError>;

    /// Drain in-flight sends and release the connection.
    fn close(self) -> Result<(), DependencyError>;
}

/// Produces a fresh `BusClient`. One attempt per call, no retry.
pub trait Connector {
    type Client: BusClient;

    fn connect(&self) -> Result<Self::Client, DependencyError>;
}

// ═══════════════════════════════════════════════════════════════
//  ConnectionManager
// ═══════════════════════════════════════════════════════════════

/// Owns at most one live handle. Disconnected ⇔ `handle.is_none()`.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    handle: Option<C::Client>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector, handle: None }
    }

    /// Memoized handle, connecting first if there is none.
    pub fn get_or_connect(&mut self) -> Result<&mut C::Client, DependencyError> {
        let client = match self.handle.take() {
            Some(client) => client,
            None => self.connector.connect()?,
        };
        Ok(self.handle.insert(client))
    }

    /// Drop back to disconnected, handing over the old handle if any.
    pub fn reset(&mut self) -> Option<C::Client> {
        self.handle.take()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }
}

// ═══════════════════════════════════════════════════════════════
//  EventPublisher
// ═══════════════════════════════════════════════════════════════

/// Publishes sweep events; every failure is swallowed.
pub struct EventPublisher<C: Connector = NatsConnector> {
    conn: ConnectionManager<C>,
}

impl EventPublisher<NatsConnector> {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(NatsConnector::new(&config.nats_url, config.connect_timeout()))
    }
}

impl<C: Connector> EventPublisher<C> {
    pub fn new(connector: C) -> Self {
        Self { conn: ConnectionManager::new(connector) }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Wrap `payload` in an envelope and send it on `topic`.
    ///
    /// Returns immediately when the bus is unreachable. A failed send
    /// loses the message and discards the handle; the next call
    /// reconnects from scratch.
    pub fn publish(&mut self, topic: &str, payload: Value) {
        if let Err(e) = self.try_publish(topic, payload) {
            tracing::debug!(topic, error = %e, "bus publish dropped");
        }
    }

    fn try_publish(&mut self, topic: &str, payload: Value) -> Result<(), DependencyError> {
        let bytes = make_envelope(topic, payload)?;
        let client = self.conn.get_or_connect()?;
        let sent = client.publish(topic, bytes).and_then(|()| client.flush());
        if sent.is_err() {
            self.conn.reset();
        }
        sent
    }

    /// `llama.benchmark.started.v1` — `{sweep_type, model, config}`.
    pub fn publish_started(&mut self, sweep_type: &str, model: &str, config: Value) {
        let payload = serde_json::json!({
            "sweep_type": sweep_type,
            "model": model,
            "config": config,
        });
        self.publish(TOPIC_STARTED, payload);
    }

    /// `llama.benchmark.cell.v1` — `{sweep_type, ...row}`. Row keys win
    /// over `sweep_type` on collision.
    pub fn publish_cell(&mut self, sweep_type: &str, row: &Map<String, Value>) {
        let mut payload = Map::with_capacity(row.len() + 1);
        payload.insert("sweep_type".into(), Value::String(sweep_type.to_string()));
        for (k, v) in row {
            payload.insert(k.clone(), v.clone());
        }
        self.publish(TOPIC_CELL, Value::Object(payload));
    }

    /// `llama.benchmark.completed.v1` — `{sweep_type, best, csv_path, total_cells}`.
    pub fn publish_completed(
        &mut self,
        sweep_type: &str,
        best: Value,
        csv_path: &str,
        total_cells: u64,
    ) {
        let payload = serde_json::json!({
            "sweep_type": sweep_type,
            "best": best,
            "csv_path": csv_path,
            "total_cells": total_cells,
        });
        self.publish(TOPIC_COMPLETED, payload);
    }

    /// Drain and release the handle. No-op when never connected.
    pub fn close(&mut self) {
        if let Some(client) = self.conn.reset() {
            if let Err(e) = client.close() {
                tracing::debug!(error = %e, "bus drain failed");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  NATS implementation
// ═══════════════════════════════════════════════════════════════

pub struct NatsConnector {
    url: String,
    timeout: Duration,
}

impl NatsConnector {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self { url: url.to_string(), timeout }
    }

    fn connect_err(&self, detail: impl ToString) -> DependencyError {
        DependencyError::Connect { url: self.url.clone(), detail: detail.to_string() }
    }
}

impl Connector for NatsConnector {
    type Client = NatsClient;

    fn connect(&self) -> Result<NatsClient, DependencyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| self.connect_err(e))?;

        let closed = Arc::new(Notify::new());
        let on_closed = closed.clone();
        let options = async_nats::ConnectOptions::new()
            .connection_timeout(self.timeout)
            .event_callback(move |event| {
                let closed = on_closed.clone();
                async move {
                    if matches!(event, async_nats::Event::Closed) {
                        closed.notify_one();
                    }
                }
            });
        let client = runtime
            .block_on(async {
                tokio::time::timeout(self.timeout, options.connect(self.url.as_str())).await
            })
            .map_err(|_| self.connect_err("timed out"))?
            .map_err(|e| self.connect_err(e))?;

        tracing::debug!(url = %self.url, "bus connected");
        Ok(NatsClient { runtime, client, closed, timeout: self.timeout })
    }
}

/// `async_nats::Client` plus the runtime that drives it.
pub struct NatsClient {
    runtime: tokio::runtime::Runtime,
    client: async_nats::Client,
    /// Signalled once the connection handler has exited after a drain.
    closed: Arc<Notify>,
    timeout: Duration,
}

impl NatsClient {
    fn bus_err(op: &'static str, detail: impl ToString) -> DependencyError {
        DependencyError::Bus { op, detail: detail.to_string() }
    }
}

impl BusClient for NatsClient {
    fn publish(&mut self, subject: &str, payload: Vec<u8>) -> Result<(), DependencyError> {
        let client = &self.client;
        let timeout = self.timeout;
        self.runtime
            .block_on(async {
                tokio::time::timeout(
                    timeout,
                    client.publish(subject.to_string(), Bytes::from(payload)),
                )
                .await
            })
            .map_err(|_| Self::bus_err("publish", "timed out"))?
            .map_err(|e| Self::bus_err("publish", e))
    }

    fn flush(&mut self) -> Result<(), DependencyError> {
        let client = &self.client;
        let timeout = self.timeout;
        self.runtime
            .block_on(async { tokio::time::timeout(timeout, client.flush()).await })
            .map_err(|_| Self::bus_err("flush", "timed out"))?
            .map_err(|e| Self::bus_err("flush", e))
    }

    /// `drain()` only queues the request; wait for the handler to report
    /// the connection closed before tearing the runtime down.
    fn close(self) -> Result<(), DependencyError> {
        let NatsClient { runtime, client, closed, timeout } = self;
        let drained = runtime
            .block_on(async move {
                tokio::time::timeout(timeout, async move {
                    let requested = client.drain().await;
                    // The handler re-checks its drain flag only when woken;
                    // releasing the last sender wakes it.
                    drop(client);
                    requested.map_err(|e| Self::bus_err("drain", e))?;
                    closed.notified().await;
                    Ok::<(), DependencyError>(())
                })
                .await
            })
            .map_err(|_| Self::bus_err("drain", "timed out"))
            .and_then(|r| r);
        runtime.shutdown_timeout(timeout);
        drained
    }
}
