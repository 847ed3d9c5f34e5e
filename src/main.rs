// src/main.rs
use log::{error, info, warn};
use spreadnet::arbitrage::engine::DetectionEngine;
use spreadnet::arbitrage::registry::OpportunityRegistry;
use spreadnet::config::Config;
use spreadnet::dex::get_all_sources;
use spreadnet::publisher::Publisher;
use spreadnet::solana::RpcMonitor;
use spreadnet::utils::{now_ms, setup_logging};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    setup_logging()?;
    info!("🌐 SpreadNet starting");

    let config = Config::from_env();
    config.validate_and_log()?;

    let rpc = Arc::new(RpcMonitor::new(&config.rpc_url));
    let sources = get_all_sources(&config);
    let registry = Arc::new(Mutex::new(OpportunityRegistry::new(now_ms())));
    let publisher = Arc::new(Publisher::new(
        config.broadcast_capacity,
        Arc::clone(&registry),
        sources.clone(),
        Arc::clone(&rpc),
    ));

    let listener = TcpListener::bind(&config.publisher_bind).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(
        Arc::clone(&publisher).serve(listener, shutdown_rx.clone()),
    );

    // Periodic stats and liveness broadcast, piggybacking the RPC probe.
    let stats_publisher = Arc::clone(&publisher);
    let stats_rpc = Arc::clone(&rpc);
    let mut stats_shutdown = shutdown_rx.clone();
    let stats_interval = Duration::from_secs(config.stats_interval_secs);
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(stats_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    stats_rpc.refresh().await;
                    stats_publisher.broadcast_stats().await;
                }
                _ = stats_shutdown.changed() => break,
            }
        }
    });

    let engine = DetectionEngine::new(&config, sources, registry, publisher);
    let engine_shutdown = shutdown_rx.clone();
    let engine_task = tokio::spawn(async move { engine.run(engine_shutdown).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Ctrl-C received; shutting down");
        }
        result = engine_task => {
            match result {
                Ok(Err(e)) => error!("Engine stopped: {}", e),
                Err(e) => error!("Engine task panicked: {}", e),
                Ok(Ok(())) => warn!("Engine exited early"),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = stats_task.await;
    if let Ok(Err(e)) = server.await {
        warn!("Publisher exited with error: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}
