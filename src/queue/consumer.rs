//! The intake queue consumer loop (spec §4.1).
//!
//! Each worker opens its own AMQP channel, sets prefetch to 1, and runs a
//! single-flight loop: parse, run the pipeline, ack or nack-without-requeue.
//! `run` spawns `worker_concurrency` of these loops and returns once all of
//! them have drained following a cancellation signal.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::message::RawListingMessage;
use crate::pipeline::{ingest_one, IngestContext};

/// Run `worker_concurrency` consumer loops against `queue_name`, until
/// `shutdown` is cancelled. Each loop finishes its current message before
/// exiting (spec §6.5: "stop accepting new work, drain in-flight").
pub async fn run(
    amqp_url: &str,
    queue_name: &str,
    worker_concurrency: usize,
    ctx: Arc<IngestContext>,
    shutdown: CancellationToken,
) -> Result<()> {
    let connection = Connection::connect(amqp_url, ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio))
        .await
        .context("failed to connect to the intake queue")?;

    let mut handles = Vec::with_capacity(worker_concurrency);
    for worker_id in 0..worker_concurrency {
        let connection = &connection;
        let channel = connection
            .create_channel()
            .await
            .context("failed to open an AMQP channel")?;
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .context("failed to declare the intake queue")?;
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .context("failed to set prefetch")?;

        let ctx = Arc::clone(&ctx);
        let queue_name = queue_name.to_owned();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(worker_id, channel, &queue_name, ctx, shutdown).await
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = ?err, "consumer worker task panicked");
        }
    }

    Ok(())
}

async fn worker_loop(
    worker_id: usize,
    channel: lapin::Channel,
    queue_name: &str,
    ctx: Arc<IngestContext>,
    shutdown: CancellationToken,
) {
    let consumer_tag = format!("realty-pipeline-worker-{worker_id}");
    let consumer = match channel
        .basic_consume(
            queue_name,
            &consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(worker_id, error = ?err, "failed to start consuming");
            return;
        }
    };
    let mut consumer = consumer;

    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => {
                info!(worker_id, "shutdown signal received, no longer accepting new messages");
                break;
            }
            next = consumer.next() => next,
        };

        let Some(delivery) = delivery else {
            warn!(worker_id, "consumer stream ended");
            break;
        };
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                error!(worker_id, error = ?err, "failed to receive delivery");
                continue;
            }
        };

        let raw = match RawListingMessage::from_slice(&delivery.data) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(worker_id, error = ?err, "malformed listing message, nacking without requeue");
                nack(&delivery).await;
                continue;
            }
        };

        match ingest_one(&raw, &ctx).await {
            Ok(id) => {
                info!(worker_id, id, "ingested listing");
                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    error!(worker_id, error = ?err, "failed to ack delivery");
                }
            }
            Err(err) => {
                warn!(worker_id, error = ?err, "ingest failed, nacking without requeue");
                nack(&delivery).await;
            }
        }
    }
}

async fn nack(delivery: &lapin::message::Delivery) {
    let options = BasicNackOptions { requeue: false, ..Default::default() };
    if let Err(err) = delivery.nack(options).await {
        error!(error = ?err, "failed to nack delivery");
    }
}
