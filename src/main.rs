//! Synapse CLI entry point: loads configuration, initializes logging, and
//! runs a demo application until it is stopped.

use std::sync::Arc;

use clap::Parser;
use synapse::config::ConfigLoader;
use synapse::instruction::schedule::Schedule;
use synapse::instruction::wait::WaitSeconds;
use synapse::logging::{self, ComponentRelayLayer, LoggerComponent};
use synapse::{Application, Event};

#[derive(Parser, Debug)]
#[command(name = "synapse", about = "component/event/scheduler demo runner", version)]
struct Cli {
    /// Path to a YAML config file, bypassing the default search path.
    #[arg(long, env = "SYNAPSE_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Seconds the demo schedule waits before finishing on its own.
    #[arg(long, default_value_t = 2.0)]
    demo_wait_seconds: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let app = Application::new(config.worker_pool_size).await;

    let logger = LoggerComponent::new("logger");
    app.register(logger.clone()).await?;
    let relay = ComponentRelayLayer::spawn(app.registry.clone(), "logger");
    let _guard = logging::init(&config.logging, Some(relay))?;

    app.scheduler
        .load(Arc::new(Schedule::new(
            "demo",
            vec![Arc::new(WaitSeconds::new(cli.demo_wait_seconds))],
        )))
        .await;
    app.scheduler.run()?;

    let bus = app.bus.clone();
    let scheduler = app.scheduler.clone();
    tokio::spawn(async move {
        scheduler.wait(None).await;
        tracing::info!("demo schedule finished, stopping application");
        let _ = bus
            .post(Event::Stop(synapse::event::StopEvent::generic("demo schedule finished")), false)
            .await;
    });

    tokio::select! {
        () = app.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, stopping");
            app.bus
                .post(Event::Stop(synapse::event::StopEvent::user("operator requested shutdown")), true)
                .await?;
            app.run().await;
        }
    }

    Ok(())
}
