use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use ruuvi_relay_ingest::database::PostgresSink;
use ruuvi_relay_ingest::sources::{
    GatewayBatchAdapter, GatewayStreamAdapter, SourceAdapter, StationAdapter,
};
use ruuvi_relay_ingest::{IngestConfig, LogSink, Pipeline, PointSink, RequestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SourceKind {
    Station,
    Gateway,
    Stream,
}

/// One inbound unit of work, as read from stdin
#[derive(Debug, Deserialize)]
struct Envelope {
    source: SourceKind,
    #[serde(default)]
    gateway_id: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    /// JSON value, or the raw text when it may not be valid JSON
    body: Value,
}

impl Envelope {
    fn body_bytes(&self) -> Vec<u8> {
        match &self.body {
            Value::String(text) => text.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        }
    }

    fn context(&self, mut ctx: RequestContext) -> RequestContext {
        ctx.gateway_id = self.gateway_id.clone();
        ctx.routing_key = self.topic.clone();
        ctx
    }
}

struct App {
    pipeline: Pipeline,
    station: StationAdapter,
    gateway: GatewayBatchAdapter,
    stream: GatewayStreamAdapter,
    sink: Box<dyn PointSink>,
}

impl App {
    fn new(config: IngestConfig) -> Self {
        let sink: Box<dyn PointSink> = match &config.database_url {
            Some(url) => Box::new(PostgresSink::new(url.clone())),
            None => {
                warn!("DATABASE_URL not set, points will only be logged");
                Box::new(LogSink)
            }
        };
        Self::with_sink(config, sink)
    }

    fn with_sink(config: IngestConfig, sink: Box<dyn PointSink>) -> Self {
        let config = Arc::new(config);

        App {
            pipeline: Pipeline::new(config.clone()),
            station: StationAdapter::new(config.clone()),
            gateway: GatewayBatchAdapter::new(config.clone()),
            stream: GatewayStreamAdapter::new(config),
            sink,
        }
    }

    fn adapter(&self, kind: SourceKind) -> &dyn SourceAdapter {
        match kind {
            SourceKind::Station => &self.station,
            SourceKind::Gateway => &self.gateway,
            SourceKind::Stream => &self.stream,
        }
    }

    async fn handle(&self, line: String, ctx: RequestContext) {
        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Ignoring unreadable envelope: {}", e);
                return;
            }
        };

        let ctx = envelope.context(ctx);
        self.pipeline
            .ingest(
                self.adapter(envelope.source),
                self.sink.as_ref(),
                &envelope.body_bytes(),
                &ctx,
            )
            .await;
    }
}

/// Handle one envelope per input line, at most `max_in_flight` at a time
///
/// Returns once the input is closed and every started message is done.
async fn main_loop<R>(
    app: Arc<App>,
    input: R,
    max_in_flight: usize,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let max_in_flight = max_in_flight.max(1);
    let mut lines = input.lines();
    let mut in_flight = FuturesUnordered::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        // Receipt time is taken when the message arrives, not when a worker frees up
        let ctx = RequestContext::now();

        if in_flight.len() >= max_in_flight {
            if let Some(Err(e)) = in_flight.next().await {
                error!("Worker failed: {}", e);
            }
        }

        let app = app.clone();
        in_flight.push(tokio::spawn(async move { app.handle(line, ctx).await }));
    }

    while let Some(result) = in_flight.next().await {
        if let Err(e) = result {
            error!("Worker failed: {}", e);
        }
    }

    info!("Input closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    let max_in_flight = config.max_in_flight;
    let app = Arc::new(App::new(config));

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    info!("Reading relay messages from stdin");
    let input = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = main_loop(app, input, max_in_flight) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
            // The blocking stdin read would hold up runtime shutdown; open
            // transactions roll back when their connections close.
            std::process::exit(0);
        }
    }

    Ok(())
}
