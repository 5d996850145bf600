use petrohub_api::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    let state = AppState::builder().config(config.clone()).build().await?;
    let app = build_router(state)?;

    Server::new(config).serve(app).await?;

    Ok(())
}
