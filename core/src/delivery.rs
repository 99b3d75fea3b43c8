//! The delivery type handed from the broker channel to the consumer.
//!
//! A [`Delivery`] is an immutable unit received from a [`Channel`](crate::Channel):
//! an opaque payload plus the channel-scoped delivery tag used for ack/reject.
//! The broker owns the message until it is acked or rejected; the consumer borrows
//! the delivery for the duration of one processing step and never retains it.

use std::fmt;

/// One message instance received from the broker channel.
///
/// The payload is opaque to the consume loop — serialization formats are a
/// concern of the processing logic, not of acknowledgement handling.
///
/// # Examples
///
/// ```
/// use conveyor_core::Delivery;
///
/// let delivery = Delivery::new(7, b"order placed".to_vec())
///     .with_routing("orders", "orders.placed")
///     .with_redelivered(false);
///
/// assert_eq!(delivery.delivery_tag, 7);
/// assert_eq!(delivery.routing_key, "orders.placed");
/// ```
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Channel-scoped identifier used for ack/reject operations.
    pub delivery_tag: u64,

    /// The exchange this message was published to.
    pub exchange: String,

    /// The routing key the message was published with.
    pub routing_key: String,

    /// Whether the broker has delivered this message before.
    pub redelivered: bool,

    /// The opaque message body.
    pub payload: Vec<u8>,

    /// Optional broker headers, represented as JSON for transport neutrality.
    pub headers: Option<serde_json::Value>,
}

impl Delivery {
    /// Create a delivery with a tag and payload; routing metadata defaults to empty.
    #[must_use]
    pub const fn new(delivery_tag: u64, payload: Vec<u8>) -> Self {
        Self {
            delivery_tag,
            exchange: String::new(),
            routing_key: String::new(),
            redelivered: false,
            payload,
            headers: None,
        }
    }

    /// Set the exchange and routing key.
    #[must_use]
    pub fn with_routing(mut self, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self.routing_key = routing_key.into();
        self
    }

    /// Mark whether the broker flagged this message as redelivered.
    #[must_use]
    pub const fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// Attach broker headers.
    #[must_use]
    pub fn with_headers(mut self, headers: serde_json::Value) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Delivery {{ tag: {}, routing_key: {}, size: {} bytes }}",
            self.delivery_tag,
            self.routing_key,
            self.payload.len()
        )
    }
}
