pub mod channels;
pub mod config;
pub mod error;
pub mod fields;
pub mod growatt;
pub mod home_assistant;
pub mod http;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod publisher;
pub mod queue;
pub mod snapshot;
pub mod status;
pub mod utils;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::growatt::interpreter::Interpreter;
use crate::growatt::link::{Connector, SerialConnector};
use crate::growatt::reader::Reader;
use crate::http::Http;
use crate::mqtt::Mqtt;
use crate::options::Action;
use crate::prelude::*;
use crate::publisher::Publisher;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const MQTT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Running tasks and the shared state they were built around.
pub struct Components {
    pub mqtt: Mqtt,
    pub status: StatusBoard,
    pub channels: Channels,
    mqtt_handle: JoinHandle<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Components {
    /// Lets the MQTT sender say goodbye, then aborts everything else.
    pub async fn stop(self) {
        info!("Stopping all components...");

        self.mqtt.stop();
        if tokio::time::timeout(MQTT_DRAIN_TIMEOUT, self.mqtt_handle).await.is_err() {
            warn!("mqtt did not stop within {}s", MQTT_DRAIN_TIMEOUT.as_secs());
        }

        for handle in &self.handles {
            handle.abort();
        }

        self.status.stats().print_summary();
        info!("Shutdown complete");
    }
}

// RUST_LOG, when set, wins over the filter given here
fn init_logging(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();
}

// -v raises this crate to debug, dependencies stay at the configured level
fn log_filter(options: &Options, config: &Config) -> String {
    if options.verbose {
        format!("{},{}=debug", config.loglevel(), env!("CARGO_CRATE_NAME"))
    } else {
        config.loglevel().to_string()
    }
}

fn spawn<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    })
}

pub fn start(config: &Config) -> Components {
    let channels = Channels::new();
    let status = StatusBoard::new();
    let snapshot = SnapshotCell::default();
    let queue = Arc::new(ByteQueue::default());

    info!("Initializing components...");

    let connector: Arc<dyn Connector> = Arc::new(SerialConnector::new(config.serial()));
    let reader = Reader::new(config.reader().clone(), connector, queue.clone(), status.clone());
    let interpreter = Interpreter::new(
        config.interpreter().clone(),
        queue,
        snapshot.clone(),
        status.clone(),
    );
    let publisher = Publisher::new(config, snapshot.clone(), status.clone(), channels.clone());
    let mqtt = Mqtt::new(config.mqtt().clone(), channels.clone(), status.clone());
    let http = Http::new(config.http().clone(), snapshot, status.clone());

    let mqtt_clone = mqtt.clone();
    let mqtt_handle = spawn("MQTT", async move { mqtt_clone.start().await });

    let handles = vec![
        spawn("Reader", async move { reader.start().await }),
        spawn("Interpreter", interpreter.start()),
        spawn("Publisher", publisher.start()),
        spawn("HTTP", async move { http.start().await }),
    ];

    Components {
        mqtt,
        status,
        channels,
        mqtt_handle,
        handles,
    }
}

/// Sends the handshake once, for `--action init`.
pub async fn init_inverter(config: &Config) -> Result<()> {
    let connector: Arc<dyn Connector> = Arc::new(SerialConnector::new(config.serial()));
    let reader = Reader::new(
        config.reader().clone(),
        connector,
        Arc::new(ByteQueue::default()),
        StatusBoard::new(),
    );

    reader.init_logger().await
}

pub async fn app(mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let options = Options::new();

    let config = Config::new(options.config_file.clone()).unwrap_or_else(|err| {
        init_logging("info");
        error!("Failed to load config {}: {:?}", options.config_file, err);
        std::process::exit(255);
    });

    init_logging(&log_filter(&options, &config));
    info!("growatt-bridge {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);
    config.log_summary();

    if options.action == Action::Init {
        return init_inverter(&config).await;
    }

    let components = start(&config);

    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping components...");
    components.stop().await;

    Ok(())
}
