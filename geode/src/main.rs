//! Mineral generation server speaking newline-delimited JSON over stdio.

mod config;
mod service;

use std::io;
use std::sync::Arc;

use anyhow::Context;
use geode_locate::LocationResolver;
use tokio::io::{AsyncWriteExt, BufReader, stdin, stdout};
use tokio::signal::ctrl_c;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::GeodeConfig;
use crate::service::{Service, serve};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Replies waiting to be written before readers are held back.
const REPLY_BUFFER: usize = 64;

fn init_tracing() {
    // stdout carries replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
}

/// Cancel `cancel_token` once `signal` fires. A signal that cannot be listened for
/// leaves the token alone.
async fn cancel_on_signal<F>(signal: F, cancel_token: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            log::info!("Received ctrl-c, shutting down");
            cancel_token.cancel();
        }
        Err(e) => log::error!("Failed to listen for ctrl-c: {e}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = GeodeConfig::path_from_env();
    let config = GeodeConfig::load_or_create(&config_path)?;
    let engine = config
        .engine
        .build_engine()
        .context("Invalid layer table in config")?;
    let resolver = LocationResolver::new(config.locate.clone())?;
    log::info!(
        "Loaded {} with {} depth layers",
        config_path.display(),
        engine.layers().layers().len()
    );

    let service = Arc::new(Service::new(
        engine,
        config.engine.limits,
        config.request_timeout(),
        resolver,
    ));

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(ctrl_c(), cancel_token.clone()));

    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(REPLY_BUFFER);
    let writer = tokio::spawn(async move {
        let mut stdout = stdout();
        while let Some(reply) = reply_rx.recv().await {
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    serve(
        service,
        BufReader::new(stdin()),
        reply_tx,
        cancel_token.clone(),
    )
    .await?;

    if !cancel_token.is_cancelled() {
        writer.await??;
    }
    Ok(())
}
