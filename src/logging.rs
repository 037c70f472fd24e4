//! `tracing`-based logging setup, plus the `LoggerComponent` that
//! republishes qualifying log lines through the ordinary
//! `Registry::set_variable` path, exposing exactly one attribute updated
//! on every relayed log line.

use std::io;
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::component::{Component, ComponentDescriptor};
use crate::component::Registry;
use crate::error::{SynapseError, SynapseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    pub log_dir: Option<std::path::PathBuf>,
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Keeps the non-blocking file appender's worker thread alive for as long
/// as logging should keep flushing.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initializes the global `tracing` subscriber from `config`, optionally
/// layering in `relay` so qualifying events also reach a [`LoggerComponent`].
///
/// # Errors
/// Returns an error if `config.level` cannot be parsed as a `tracing::Level`.
pub fn init(config: &LogConfig, relay: Option<ComponentRelayLayer>) -> SynapseResult<LoggingGuard> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| SynapseError::bad_parameters(format!("invalid log level: {}", config.level)))?;
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = match config.rotation {
                RotationPolicy::Daily => rolling::daily(dir, "synapse.log"),
                RotationPolicy::Hourly => rolling::hourly(dir, "synapse.log"),
                RotationPolicy::Never => rolling::never(dir, "synapse.log"),
            };
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(env_filter.clone());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stdout_layer = config.enable_stdout.then(|| match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stdout)
            .with_target(true)
            .with_filter(env_filter.clone())
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(io::stdout)
            .with_target(true)
            .with_filter(env_filter.clone())
            .boxed(),
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer)
        .with(relay)
        .init();

    tracing::info!(level = %config.level, format = ?config.format, "logging initialized");
    Ok(LoggingGuard { _file_guard: file_guard })
}

/// A `tracing_subscriber::Layer` that forwards every formatted event
/// message to a channel, so a background task can feed it to a
/// [`LoggerComponent`] through `Registry::set_variable`.
pub struct ComponentRelayLayer {
    sender: mpsc::UnboundedSender<String>,
}

impl ComponentRelayLayer {
    /// Builds the layer and spawns the background task that republishes
    /// relayed lines onto `component_name` via `registry`.
    #[must_use]
    pub fn spawn(registry: Arc<Registry>, component_name: impl Into<String>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
        let component_name = component_name.into();
        tokio::spawn(async move {
            while let Some(line) = receiver.recv().await {
                if let Err(error) = registry
                    .set_variable(&component_name, "last_log_line", serde_json::Value::String(line))
                    .await
                {
                    tracing::debug!(%error, "logger component relay could not publish log line");
                }
            }
        });
        Self { sender }
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for ComponentRelayLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        if !visitor.0.is_empty() {
            let _ = self.sender.send(visitor.0);
        }
    }
}

/// A component that dogfoods the variable-update protocol: its single
/// public variable, `last_log_line`, is written through
/// `Registry::set_variable` whenever a relayed log line arrives.
pub struct LoggerComponent {
    name: String,
    last_log_line: StdMutex<String>,
}

impl LoggerComponent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            last_log_line: StdMutex::new(String::new()),
        })
    }
}

#[async_trait::async_trait]
impl Component for LoggerComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> ComponentDescriptor {
        ComponentDescriptor::new(vec![], vec!["last_log_line".into()])
    }

    async fn get_variable(&self, variable: &str) -> SynapseResult<serde_json::Value> {
        match variable {
            "last_log_line" => Ok(serde_json::Value::String(self.last_log_line.lock().unwrap().clone())),
            other => Err(SynapseError::attribute_fault(&self.name, other, "no such variable")),
        }
    }

    async fn set_variable(&self, variable: &str, value: serde_json::Value) -> SynapseResult<()> {
        match variable {
            "last_log_line" => {
                *self.last_log_line.lock().unwrap() = value.as_str().unwrap_or_default().to_string();
                Ok(())
            }
            other => Err(SynapseError::attribute_fault(&self.name, other, "no such variable")),
        }
    }

    async fn call_method(&self, method: &str, _args: Vec<serde_json::Value>) -> SynapseResult<serde_json::Value> {
        Err(SynapseError::bad_parameters(format!("no such method: {method}")))
    }

    async fn stop(&self) {}
}
