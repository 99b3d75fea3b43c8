//! Broker channel abstraction for the consume loop.
//!
//! This module provides the [`Channel`] trait the consumer drives: register a
//! consumer, block waiting for the next delivery with an optional timeout, and
//! acknowledge or reject deliveries by tag. Transport concerns — connections,
//! wire framing, reconnection — live entirely behind this trait.
//!
//! # Timeouts are not errors
//!
//! [`Channel::wait`] distinguishes the expected "no delivery arrived within the
//! bound" condition ([`WaitOutcome::TimedOut`]) from transport failure
//! ([`ChannelError`]). The consume loop absorbs the former and propagates the
//! latter uncaught.
//!
//! # Implementations
//!
//! - `AmqpChannel` in `conveyor-amqp` — production, over the lapin AMQP client
//! - `ScriptedChannel` in `conveyor-testing` — replayed wait scripts for tests
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
//! so that `Arc<dyn Channel>` trait objects can be shared with the consumer.

use crate::delivery::Delivery;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by [`Channel`] operations.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ChannelError>> + Send + 'a>>;

/// Errors that can occur during channel operations.
///
/// A timed-out wait is *not* an error — see [`WaitOutcome::TimedOut`].
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// Failed to connect to the broker.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Broker topology declaration (exchange, queue, binding) failed.
    #[error("Fabric setup failed for '{object}': {reason}")]
    SetupFailed {
        /// The exchange, queue, or binding that failed to declare.
        object: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to register a consumer on a queue.
    #[error("Consumer registration failed for queue '{queue}': {reason}")]
    RegisterFailed {
        /// The queue the registration targeted.
        queue: String,
        /// The reason for failure.
        reason: String,
    },

    /// A wait was issued before any consumer was registered.
    #[error("No consumer registered on this channel")]
    NotRegistered,

    /// Acknowledging a delivery failed.
    #[error("Ack failed for delivery tag {delivery_tag}: {reason}")]
    AckFailed {
        /// The tag of the delivery being acknowledged.
        delivery_tag: u64,
        /// The reason for failure.
        reason: String,
    },

    /// Rejecting a delivery failed.
    #[error("Reject failed for delivery tag {delivery_tag}: {reason}")]
    RejectFailed {
        /// The tag of the delivery being rejected.
        delivery_tag: u64,
        /// The reason for failure.
        reason: String,
    },

    /// Network or transport error distinct from a timeout.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Generic error for other failures.
    #[error("Channel error: {0}")]
    Other(String),
}

/// The result of a bounded wait on the channel.
#[derive(Debug)]
pub enum WaitOutcome {
    /// A delivery arrived within the bound.
    Delivery(Delivery),

    /// No delivery arrived within the bound. Expected and signalled, not an error.
    TimedOut,
}

/// Consumer registration options.
///
/// Queue name, consumer tag, and exclusivity flags are configuration, not core
/// loop logic — the consumer passes them through to the channel unchanged.
#[derive(Clone, Debug, Default)]
pub struct ConsumeOptions {
    /// The queue to consume from.
    pub queue: String,

    /// Consumer tag; brokers generate one when empty.
    pub consumer_tag: String,

    /// Request exclusive access to the queue.
    pub exclusive: bool,

    /// Do not deliver messages published on this same connection.
    pub no_local: bool,

    /// Broker-side auto-acknowledgement; the loop's ack/reject calls become no-ops.
    pub no_ack: bool,
}

impl ConsumeOptions {
    /// Options for consuming from the named queue with broker-default flags.
    #[must_use]
    pub fn queue(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            ..Self::default()
        }
    }
}

/// Quality-of-service options applied before consuming.
#[derive(Clone, Copy, Debug, Default)]
pub struct QosOptions {
    /// Maximum number of unacknowledged deliveries in flight; 0 = unlimited.
    pub prefetch_count: u16,

    /// Prefetch window in bytes; 0 = unlimited.
    pub prefetch_size: u32,

    /// Apply the limits per-channel rather than per-consumer.
    pub global: bool,
}

/// Trait for broker channel implementations.
///
/// The consume loop holds a channel as `Arc<dyn Channel>` and drives it strictly
/// sequentially: setup, registration, then alternating wait and ack/reject calls.
/// Implementations must be `Send + Sync`; they are never called concurrently by a
/// single consumer.
///
/// # Examples
///
/// ```rust,ignore
/// let channel: Arc<dyn Channel> = Arc::new(AmqpChannel::builder()
///     .uri("amqp://localhost:5672/%2f")
///     .queue("jobs")
///     .connect()
///     .await?);
///
/// channel.register_consumer(&ConsumeOptions::queue("jobs")).await?;
/// match channel.wait(Some(Duration::from_secs(30))).await? {
///     WaitOutcome::Delivery(delivery) => channel.ack(delivery.delivery_tag).await?,
///     WaitOutcome::TimedOut => { /* idle */ }
/// }
/// ```
pub trait Channel: Send + Sync {
    /// Declare broker topology (exchanges, queues, bindings) before consuming.
    ///
    /// The consumer calls this once per `consume` invocation unless auto-setup
    /// has been disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::SetupFailed`] if a declaration is refused.
    fn setup_fabric(&self) -> ChannelFuture<'_, ()>;

    /// Apply quality-of-service limits.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::TransportError`] if the broker refuses the limits.
    fn qos(&self, options: &QosOptions) -> ChannelFuture<'_, ()>;

    /// Register a consumer on the channel.
    ///
    /// Must be called before [`Channel::wait`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::RegisterFailed`] if the broker refuses the consumer.
    fn register_consumer(&self, options: &ConsumeOptions) -> ChannelFuture<'_, ()>;

    /// Block until the next delivery arrives, bounded by `timeout`.
    ///
    /// `None` blocks indefinitely; with `None` the [`WaitOutcome::TimedOut`]
    /// branch is unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotRegistered`] if no consumer has been registered,
    /// or [`ChannelError::TransportError`] for failures distinct from a timeout.
    fn wait(&self, timeout: Option<Duration>) -> ChannelFuture<'_, WaitOutcome>;

    /// Acknowledge the delivery with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AckFailed`] if the broker refuses the ack.
    fn ack(&self, delivery_tag: u64) -> ChannelFuture<'_, ()>;

    /// Reject the delivery with the given tag, optionally requeueing it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::RejectFailed`] if the broker refuses the reject.
    fn reject(&self, delivery_tag: u64, requeue: bool) -> ChannelFuture<'_, ()>;

    /// Whether the underlying transport is currently usable.
    fn is_ready(&self) -> bool;
}
