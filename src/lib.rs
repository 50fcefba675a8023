//! Ingestion of RuuviTag broadcasts relayed by stations and gateways
//!
//! Relays forward raw advertisements in three shapes (station reports, gateway
//! HTTP batches and gateway pub/sub messages). A [`sources::SourceAdapter`]
//! turns each shape into samples, and the [`pipeline::Pipeline`] decodes them
//! into [`models::SensorPoint`]s with collision-free timestamps and hands each
//! batch to a [`sink::PointSink`].

pub mod config;
pub mod database;
pub mod decoding;
pub mod derived;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sequencer;
pub mod sink;
pub mod sources;

pub use config::IngestConfig;
pub use error::{ConfigError, DecodeError, IngestError, SinkError};
pub use models::{Batch, MacAddress, Reading, RequestContext, Sample, SampleMeta, SensorPoint};
pub use pipeline::{IngestSummary, Pipeline};
pub use sink::{LogSink, PointSink};
