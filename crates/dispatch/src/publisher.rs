//! Broker publisher abstraction.
//!
//! The [`EventPublisher`] trait is the seam between the rule engine and the
//! message broker. Production code uses [`AmqpPublisher`] (lapin), tests use an
//! in-memory publisher that records every send.
//!
//! # Topology
//!
//! ```text
//! AmqpPublisher::connect
//!   ├─ connection + channel
//!   ├─ exchange declare (durable, not auto-deleted, not internal)
//!   └─ per trigger: queue declare (durable) + queue bind (routing key)
//! ```
//!
//! The topology is declared exactly once under one setup deadline; a failure
//! or timeout at any stage closes the connection and aborts construction with
//! [`DispatchError::BrokerSetup`].
//!
//! # Delivery
//!
//! Events are published fire-and-forget: non-persistent delivery mode, no
//! publisher confirms awaited, no retry.

use std::future::Future;
use std::time::Duration;

use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use logwire_core::event::Event;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info};

use crate::config::{DispatcherInstance, Trigger};
use crate::error::DispatchError;

/// Header carrying the logical record type of a published event.
pub const TYPE_ID_HEADER: &str = "__TypeId__";

/// Content type of published records.
pub const CONTENT_TYPE: &str = "application/json";

/// Content encoding of published records.
pub const CONTENT_ENCODING: &str = "utf8";

/// AMQP delivery mode 1 (non-persistent).
const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// AMQP reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// Upper bound on closing a connection whose setup failed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Trait abstracting the broker send operation.
///
/// Implementations must be cheap to call concurrently from a single dispatcher
/// task. Errors are reported to the caller, which logs and counts them without
/// retrying.
pub trait EventPublisher: Send + Sync + 'static {
    /// Publishes one event under the trigger's routing key.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Publish` if serialization or the broker call fails.
    fn send(
        &self,
        event: &Event,
        trigger: &Trigger,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

/// Production publisher backed by one lapin connection and channel.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    exchange: String,
    record_type: String,
}

impl AmqpPublisher {
    /// Connects to the broker and declares the full topology for `instance`.
    ///
    /// The handshake and every declaration share one `setup_timeout` deadline.
    /// A failure after the connection is open closes it before returning.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::BrokerSetup` naming the failed stage.
    pub async fn connect(
        instance: &DispatcherInstance,
        setup_timeout: Duration,
    ) -> Result<Self, DispatchError> {
        info!(
            exchange = instance.exchange.as_str(),
            exchange_type = instance.exchange_type.as_str(),
            timeout_secs = setup_timeout.as_secs_f64(),
            "connecting to broker"
        );
        let deadline = Instant::now() + setup_timeout;

        let connection = timeout_at(
            deadline,
            Connection::connect(&instance.uri, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| timed_out("connect", setup_timeout))?
        .map_err(|e| setup_error("connect", e))?;

        let channel = guard_setup(
            deadline,
            setup_timeout,
            declare_topology(&connection, instance),
            |reason| close_connection(&connection, reason),
        )
        .await?;

        Ok(Self {
            connection,
            channel,
            exchange: instance.exchange.clone(),
            record_type: instance.record_type().to_owned(),
        })
    }

    /// Exchange this publisher sends to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Closes the channel and connection.
    pub async fn close(&self) {
        if let Err(e) = self.channel.close(REPLY_SUCCESS, "shutdown").await {
            debug!(error = %e, "channel close failed");
        }
        close_connection(&self.connection, "shutdown").await;
    }
}

/// Opens the channel and declares the exchange plus one bound queue per trigger.
async fn declare_topology(
    connection: &Connection,
    instance: &DispatcherInstance,
) -> Result<Channel, DispatchError> {
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| setup_error("channel", e))?;

    channel
        .exchange_declare(
            &instance.exchange,
            exchange_kind(&instance.exchange_type),
            ExchangeDeclareOptions {
                durable: true,
                auto_delete: false,
                internal: false,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| setup_error("exchange declare", e))?;

    for (name, trigger) in &instance.triggers {
        channel
            .queue_declare(
                &trigger.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| setup_error("queue declare", e))?;

        channel
            .queue_bind(
                &trigger.queue,
                &instance.exchange,
                &trigger.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| setup_error("queue bind", e))?;

        info!(
            trigger = name.as_str(),
            queue = trigger.queue.as_str(),
            routing_key = trigger.routing_key.as_str(),
            exchange = instance.exchange.as_str(),
            "queue bound to exchange"
        );
    }

    Ok(channel)
}

/// Runs a post-connect setup step under `deadline`.
///
/// On error or expiry `cleanup` runs with a close reason before the error is
/// returned. Expiry is reported as stage `topology`.
async fn guard_setup<T, S, C, F>(
    deadline: Instant,
    setup_timeout: Duration,
    setup: S,
    cleanup: F,
) -> Result<T, DispatchError>
where
    S: Future<Output = Result<T, DispatchError>>,
    F: FnOnce(&'static str) -> C,
    C: Future<Output = ()>,
{
    match timeout_at(deadline, setup).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            cleanup("setup failed").await;
            Err(e)
        }
        Err(_) => {
            cleanup("setup timed out").await;
            Err(timed_out("topology", setup_timeout))
        }
    }
}

/// Closes the connection, giving a stalled broker at most `CLOSE_TIMEOUT`.
async fn close_connection(connection: &Connection, reason: &str) {
    match timeout(CLOSE_TIMEOUT, connection.close(REPLY_SUCCESS, reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "connection close failed"),
        Err(_) => debug!("connection close timed out"),
    }
}

impl EventPublisher for AmqpPublisher {
    async fn send(&self, event: &Event, trigger: &Trigger) -> Result<(), DispatchError> {
        let payload = encode(event)?;
        debug!(
            routing_key = trigger.routing_key.as_str(),
            bytes = payload.len(),
            "publishing event"
        );

        // The confirm is dropped without being awaited.
        let _confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &trigger.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties(&self.record_type),
            )
            .await
            .map_err(|e| DispatchError::Publish(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for AmqpPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpPublisher")
            .field("exchange", &self.exchange)
            .field("record_type", &self.record_type)
            .finish_non_exhaustive()
    }
}

/// Serializes the event fields (including augmentation) into the published record.
pub fn encode(event: &Event) -> Result<Vec<u8>, DispatchError> {
    serde_json::to_vec(event.fields()).map_err(|e| DispatchError::Publish(e.to_string()))
}

/// Message properties shared by every published record.
fn properties(record_type: &str) -> BasicProperties {
    let mut headers = FieldTable::default();
    headers.insert(TYPE_ID_HEADER.into(), AMQPValue::LongString(record_type.into()));

    BasicProperties::default()
        .with_content_type(CONTENT_TYPE.into())
        .with_content_encoding(CONTENT_ENCODING.into())
        .with_delivery_mode(DELIVERY_MODE_TRANSIENT)
        .with_headers(headers)
}

/// Maps the configured exchange type onto a lapin exchange kind.
fn exchange_kind(name: &str) -> ExchangeKind {
    match name.trim().to_lowercase().as_str() {
        "direct" => ExchangeKind::Direct,
        "fanout" => ExchangeKind::Fanout,
        "topic" => ExchangeKind::Topic,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Custom(name.to_owned()),
    }
}

fn timed_out(stage: &'static str, after: Duration) -> DispatchError {
    DispatchError::BrokerSetup {
        stage,
        reason: format!("timed out after {after:?}"),
    }
}

fn setup_error(stage: &'static str, err: lapin::Error) -> DispatchError {
    DispatchError::BrokerSetup {
        stage,
        reason: err.to_string(),
    }
}
