//! # Conveyor Core
//!
//! Core traits and types for the Conveyor message-queue consumer.
//!
//! This crate defines the seams between the consume loop and its collaborators:
//!
//! - [`Delivery`] — one message handed from the broker channel to the consumer
//! - [`ProcessingOutcome`] — what the processing logic decided should happen to it
//! - [`Channel`] — the broker channel contract (register, wait, ack, reject)
//! - [`Notifier`] — synchronous lifecycle-event dispatch around the loop
//! - [`DeliveryHandler`] — the user-supplied processing logic
//!
//! The consume loop itself lives in `conveyor-consumer`; the production AMQP
//! channel lives in `conveyor-amqp`; scripted mocks for every contract live in
//! `conveyor-testing`.
//!
//! ## Example
//!
//! ```
//! use conveyor_core::{Delivery, ProcessingOutcome};
//! use conveyor_core::handler::FnHandler;
//!
//! // Processing logic is a handler from a delivery to an outcome.
//! let handler = FnHandler::new(|delivery: &Delivery| {
//!     if delivery.payload.is_empty() {
//!         Ok(ProcessingOutcome::RejectDrop)
//!     } else {
//!         Ok(ProcessingOutcome::Ack)
//!     }
//! });
//! # let _ = handler;
//! ```

pub mod channel;
pub mod delivery;
pub mod handler;
pub mod notifier;
pub mod outcome;

pub use channel::{Channel, ChannelError, ConsumeOptions, QosOptions, WaitOutcome};
pub use delivery::Delivery;
pub use handler::{DeliveryHandler, FnHandler, HandlerError};
pub use notifier::{ConsumerEvent, NoopNotifier, Notifier};
pub use outcome::ProcessingOutcome;
