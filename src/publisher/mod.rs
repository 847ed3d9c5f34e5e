// src/publisher/mod.rs
//! Websocket push channel for downstream consumers.
//!
//! Detection publishes onto a broadcast channel; each connected client gets
//! its own forwarding task. The channel is bounded, so a client that cannot
//! keep up loses the oldest messages instead of stalling detection.

use crate::arbitrage::registry::OpportunityRegistry;
use crate::arbitrage::types::{Opportunity, SystemStats};
use crate::dex::{ConnectionHealth, QuoteSource};
use crate::error::{ArbError, Result};
use crate::solana::RpcMonitor;
use crate::utils::now_ms;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;

/// Liveness block pushed alongside stats: every quote source plus the RPC
/// endpoint the process depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub sources: BTreeMap<String, ConnectionHealth>,
    pub rpc_healthy: bool,
    pub last_slot: u64,
    pub last_update_ms: u64,
}

/// Wire envelope. Serializes as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushMessage {
    NewOpportunity(Opportunity),
    SystemStats(SystemStats),
    ConnectionStatus(ConnectionStatus),
    OpportunitiesUpdate(Vec<Opportunity>),
}

pub struct Publisher {
    tx: broadcast::Sender<PushMessage>,
    registry: Arc<Mutex<OpportunityRegistry>>,
    sources: Vec<Arc<dyn QuoteSource>>,
    rpc: Arc<RpcMonitor>,
}

impl Publisher {
    pub fn new(
        broadcast_capacity: usize,
        registry: Arc<Mutex<OpportunityRegistry>>,
        sources: Vec<Arc<dyn QuoteSource>>,
        rpc: Arc<RpcMonitor>,
    ) -> Self {
        let (tx, _) = broadcast::channel(broadcast_capacity);
        Self {
            tx,
            registry,
            sources,
            rpc,
        }
    }

    /// Fans a message out to all connected clients. With nobody connected the
    /// send fails benignly and the message is dropped.
    pub fn publish(&self, message: PushMessage) {
        match self.tx.send(message) {
            Ok(receivers) => debug!("Published to {} subscribers", receivers),
            Err(_) => debug!("No subscribers connected; message dropped"),
        }
    }

    /// A receiver over everything published from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.tx.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let sources = self
            .sources
            .iter()
            .map(|s| (s.name().to_string(), s.health().snapshot()))
            .collect();
        ConnectionStatus {
            sources,
            rpc_healthy: self.rpc.is_healthy(),
            last_slot: self.rpc.last_slot(),
            last_update_ms: now_ms(),
        }
    }

    /// Pushes the periodic stats and liveness pair.
    pub async fn broadcast_stats(&self) {
        let stats = self.registry.lock().await.stats(now_ms());
        info!(
            "📊 {} opportunities total | avg profit {:.2}% | best {:.2}% | {:.1}/min",
            stats.total_opportunities,
            stats.avg_profit_percentage,
            stats.best_profit,
            stats.opportunities_per_minute
        );
        self.publish(PushMessage::SystemStats(stats));
        self.publish(PushMessage::ConnectionStatus(self.connection_status()));
    }

    /// Accept loop. Each client gets a dedicated task holding its own
    /// broadcast receiver; the loop exits on the shutdown signal.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| ArbError::PublishError(format!("listener address: {}", e)))?;
        info!("📡 Publisher listening on {}", local);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let publisher = Arc::clone(&self);
                            let client_shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = publisher.handle_client(stream, addr, client_shutdown).await {
                                    debug!("Client {} closed: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Publisher shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Serves one client: a state snapshot on connect, then live forwarding.
    async fn handle_client(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| ArbError::PublishError(format!("handshake with {}: {}", addr, e)))?;
        info!("🔌 Client connected: {}", addr);
        let (mut sink, mut source) = ws.split();

        // Subscribe before snapshotting so nothing published in between is
        // missed; duplicates are tolerable, gaps are not.
        let mut rx = self.tx.subscribe();
        let snapshot = {
            let now = now_ms();
            let registry = self.registry.lock().await;
            (registry.snapshot(now), registry.stats(now))
        };
        let initial = [
            PushMessage::ConnectionStatus(self.connection_status()),
            PushMessage::SystemStats(snapshot.1),
            PushMessage::OpportunitiesUpdate(snapshot.0),
        ];
        for message in initial {
            let text = serde_json::to_string(&message)?;
            sink.send(Message::Text(text))
                .await
                .map_err(|e| ArbError::PublishError(format!("send to {}: {}", addr, e)))?;
        }

        loop {
            tokio::select! {
                broadcast = rx.recv() => {
                    match broadcast {
                        Ok(message) => {
                            let text = serde_json::to_string(&message)?;
                            if sink.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Client {} lagged; dropped {} messages", addr, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Ping(payload))) => {
                            if sink.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // inbound text/binary is ignored
                        Some(Err(e)) => {
                            debug!("Client {} read error: {}", addr, e);
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        info!("Client disconnected: {}", addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast::error::TryRecvError;

    fn stats(total_opportunities: u64) -> SystemStats {
        SystemStats {
            total_opportunities,
            avg_profit_percentage: 1.2,
            opportunities_per_minute: 3.5,
            uptime_seconds: 120.0,
            last_opportunity_time_ms: 1_700_000_000_000,
            top_pair: "SOL/USDC".to_string(),
            best_profit: 4.2,
        }
    }

    fn publisher_with_capacity(capacity: usize) -> Publisher {
        let registry = Arc::new(Mutex::new(OpportunityRegistry::new(0)));
        Publisher::new(
            capacity,
            registry,
            Vec::new(),
            Arc::new(RpcMonitor::new("http://localhost:8899")),
        )
    }

    #[test]
    fn test_wire_envelope_shape() {
        let json = serde_json::to_string(&PushMessage::SystemStats(stats(7))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "system_stats");
        assert_eq!(value["data"]["total_opportunities"], 7);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest_and_never_blocks() {
        let publisher = publisher_with_capacity(2);
        let mut rx = publisher.subscribe();

        // Five publishes against a capacity of two, with the receiver
        // stalled the whole time. Every send returns immediately.
        for n in 0..5 {
            publisher.publish(PushMessage::SystemStats(stats(n)));
        }

        // The stalled receiver is told it lagged, then resumes at the
        // oldest retained message; the newest two survive.
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(_))));
        match rx.try_recv() {
            Ok(PushMessage::SystemStats(s)) => assert_eq!(s.total_opportunities, 3),
            other => panic!("expected stats 3, got {:?}", other),
        }
        match rx.try_recv() {
            Ok(PushMessage::SystemStats(s)) => assert_eq!(s.total_opportunities, 4),
            other => panic!("expected stats 4, got {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_opportunities_update_roundtrip_tag() {
        let json =
            serde_json::to_string(&PushMessage::OpportunitiesUpdate(Vec::new())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "opportunities_update");
        assert!(value["data"].as_array().unwrap().is_empty());
    }
}
