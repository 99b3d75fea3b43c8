//! The user-supplied processing logic invoked for each delivery.
//!
//! A [`DeliveryHandler`] takes one borrowed [`Delivery`] and returns a
//! [`ProcessingOutcome`] that the consume loop translates into broker actions.
//! Handler errors are never caught, wrapped, or acknowledged away by the core —
//! they propagate out of the loop, and the broker's redelivery-on-disconnect
//! behaviour is the recovery path.

use crate::delivery::Delivery;
use crate::outcome::ProcessingOutcome;
use std::future::Future;
use std::pin::Pin;

/// The error type handlers may fail with.
///
/// Boxed for flexibility: any error implementing the standard `Error` trait
/// works. The consume loop surfaces it unmodified.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by [`DeliveryHandler::handle`].
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProcessingOutcome, HandlerError>> + Send + 'a>>;

/// Trait for delivery processing logic.
///
/// Implementations must be `Send + Sync`; the consumer holds the handler as
/// `Arc<dyn DeliveryHandler>` and invokes it strictly sequentially — one
/// delivery is fully processed before the next wait begins.
///
/// # Examples
///
/// ```
/// use conveyor_core::{Delivery, ProcessingOutcome};
/// use conveyor_core::handler::{DeliveryHandler, HandlerFuture};
///
/// struct PrintHandler;
///
/// impl DeliveryHandler for PrintHandler {
///     fn handle<'a>(&'a self, delivery: &'a Delivery) -> HandlerFuture<'a> {
///         Box::pin(async move {
///             println!("received {} bytes", delivery.payload.len());
///             Ok(ProcessingOutcome::Ack)
///         })
///     }
/// }
/// ```
pub trait DeliveryHandler: Send + Sync {
    /// Process one delivery and decide its acknowledgement outcome.
    ///
    /// # Errors
    ///
    /// Any error returned here propagates out of the consume loop uncaught; no
    /// ack or reject is issued for the delivery that triggered it.
    fn handle<'a>(&'a self, delivery: &'a Delivery) -> HandlerFuture<'a>;
}

/// Adapts a plain closure into a [`DeliveryHandler`].
///
/// # Examples
///
/// ```
/// use conveyor_core::{Delivery, ProcessingOutcome};
/// use conveyor_core::handler::FnHandler;
///
/// let handler = FnHandler::new(|_delivery: &Delivery| Ok(ProcessingOutcome::Ack));
/// # let _ = handler;
/// ```
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(&Delivery) -> Result<ProcessingOutcome, HandlerError> + Send + Sync,
{
    /// Wrap a closure as a handler.
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DeliveryHandler for FnHandler<F>
where
    F: Fn(&Delivery) -> Result<ProcessingOutcome, HandlerError> + Send + Sync,
{
    fn handle<'a>(&'a self, delivery: &'a Delivery) -> HandlerFuture<'a> {
        let result = (self.0)(delivery);
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_handler_forwards_outcome() {
        let handler = FnHandler::new(|delivery: &Delivery| {
            Ok(ProcessingOutcome::from(!delivery.payload.is_empty()))
        });

        let full = Delivery::new(1, vec![1]);
        let empty = Delivery::new(2, vec![]);

        assert!(matches!(
            handler.handle(&full).await,
            Ok(ProcessingOutcome::Ack)
        ));
        assert!(matches!(
            handler.handle(&empty).await,
            Ok(ProcessingOutcome::RejectRequeue)
        ));
    }

    #[tokio::test]
    async fn fn_handler_forwards_errors() {
        let handler = FnHandler::new(|_delivery: &Delivery| {
            Err(HandlerError::from("payload did not parse"))
        });

        let result = handler.handle(&Delivery::new(1, vec![])).await;
        assert!(result.is_err());
    }
}
