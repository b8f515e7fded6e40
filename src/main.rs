use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peer_ext::cli;
use peer_ext::gossip::{ReplicationOp, StateProviderExtension};
use peer_ext::offledger::{ExpiringStoreProvider, MemoryEngine};
use peer_ext::settings::{APP_NAME, APP_VERSION};
use peer_ext::RoleRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peer_ext=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings();

    let roles = RoleRegistry::new(settings.roles.clone());
    let extension = StateProviderExtension::new(settings.channel_id.clone(), roles);
    let provider = ExpiringStoreProvider::new(
        Arc::new(MemoryEngine::new()),
        &settings.offledger_settings(),
    )?;

    info!(
        "Starting {} {} on channel [{}] with roles [{}]",
        APP_NAME, APP_VERSION, settings.channel_id, settings.roles
    );
    for op in [
        ReplicationOp::AddPayload,
        ReplicationOp::StoreBlock,
        ReplicationOp::AntiEntropy,
        ReplicationOp::HandleStateRequest,
    ] {
        info!("[{}] {}: {:?}", extension.channel_id(), op, extension.dispatch(op));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    provider.shutdown().await?;

    Ok(())
}
