use anyhow::{Context, Result};
use clap::Parser;
use concord::{AdmissionController, Corpus, RateLimiter};
use concord_server::{router, AppState, ServerArgs};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    concord::init_tracing();
    let args = ServerArgs::parse();

    let corpus = Corpus::load(&args.directory, &args.load_options())
        .with_context(|| format!("could not load corpus from {}", args.directory.display()))?;

    let state = AppState {
        corpus: Arc::new(corpus),
        rate_limiter: Arc::new(RateLimiter::new(args.rate_limit())),
        admission: AdmissionController::new(args.max_concurrent),
        settings: Arc::new(args.query_settings()),
    };
    let app = router(state);

    let addr = args.listen_addr()?;
    tracing::info!(address = %addr, "concord listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("could not bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
