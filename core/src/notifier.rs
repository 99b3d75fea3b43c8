//! Lifecycle-event dispatch around the consume loop.
//!
//! The consumer fires named events at fixed points: once per received delivery
//! ([`ConsumerEvent::OnConsume`]), around each processing step
//! ([`ConsumerEvent::BeforeProcessing`] / [`ConsumerEvent::AfterProcessing`]),
//! and on each observed idle timeout ([`ConsumerEvent::OnIdle`]).
//!
//! Dispatch is synchronous: the notifier runs to completion before the loop
//! proceeds. The core ignores everything a handler does except the idle event's
//! `force_stop` field, which is read back after dispatch returns — an explicit
//! in/out channel from handler to loop.

use crate::delivery::Delivery;

/// A lifecycle event dispatched by the consume loop.
///
/// Delivery-bearing events borrow the delivery for the duration of the dispatch;
/// notifiers must not retain it.
#[derive(Debug)]
pub enum ConsumerEvent<'a> {
    /// A delivery was received, before any processing. Fired once per delivery.
    OnConsume {
        /// The delivery about to be processed.
        delivery: &'a Delivery,
    },

    /// Processing of a delivery is about to begin.
    BeforeProcessing {
        /// The delivery being processed.
        delivery: &'a Delivery,
    },

    /// Processing of a delivery finished and its acknowledgement action was issued.
    AfterProcessing {
        /// The delivery that was processed.
        delivery: &'a Delivery,
    },

    /// A wait timed out with no delivery.
    OnIdle {
        /// Set to `true` by a handler to request loop termination. Read back by
        /// the loop after dispatch; defaults to `false` (the timeout is transient
        /// and the loop waits again).
        force_stop: bool,
    },
}

impl ConsumerEvent<'_> {
    /// Stable name of this event, for dispatch-by-name notifier implementations.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OnConsume { .. } => "on_consume",
            Self::BeforeProcessing { .. } => "before_processing",
            Self::AfterProcessing { .. } => "after_processing",
            Self::OnIdle { .. } => "on_idle",
        }
    }
}

/// Trait for lifecycle-event notifiers.
///
/// Any implementation satisfies the contract as long as dispatch is synchronous
/// and completes before the loop's next step: a direct method call, a typed
/// broadcast, a callback registry.
///
/// # Examples
///
/// ```
/// use conveyor_core::{ConsumerEvent, Notifier};
///
/// struct LogNotifier;
///
/// impl Notifier for LogNotifier {
///     fn dispatch(&self, event: &mut ConsumerEvent<'_>) {
///         println!("consumer event: {}", event.name());
///     }
/// }
/// ```
pub trait Notifier: Send + Sync {
    /// Dispatch one event. Mutations to the event (the idle `force_stop` flag)
    /// are visible to the loop after this returns.
    fn dispatch(&self, event: &mut ConsumerEvent<'_>);
}

/// A notifier that ignores every event. The consumer's default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn dispatch(&self, _event: &mut ConsumerEvent<'_>) {}
}
