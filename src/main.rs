use tinyserve::config::Config;
use tinyserve::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let level = cfg
        .log
        .level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .init();

    let server = Server::bind(&cfg)?;
    let shutdown = server.shutdown_handle();
    let mut run = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        res = &mut run => {
            res??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.shutdown();
            run.await??;
        }
    }

    Ok(())
}
