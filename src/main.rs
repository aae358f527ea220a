use anyhow::Result;
use hostpanel::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    // Without process enumeration there is nothing to show.
    let source = Arc::new(source::SysinfoSource::new(&app_config)?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let (monitor, scheduler_handle) = scheduler::spawn(
        scheduler::SchedulerDeps {
            source,
            sinks: vec![Box::new(sink::LogSink)],
            shutdown_rx,
        },
        scheduler::SchedulerConfig::from(&app_config),
    );

    if app_config.panel.enabled {
        let app = routes::app(monitor);
        let addr = format!("{}:{}", app_config.panel.host, app_config.panel.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Panel feed on http://{}", addr);
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = shutdown_signal() => {
                tracing::info!("Received shutdown signal");
            }
        }
    } else {
        tracing::info!("Panel feed disabled; logging samples only");
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
    }

    let _ = shutdown_tx.send(());
    let _ = scheduler_handle.await;
    Ok(())
}
