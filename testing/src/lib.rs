//! # Conveyor Testing
//!
//! Testing utilities for Conveyor consumers.
//!
//! This crate provides deterministic mock implementations of every contract the
//! consume loop depends on:
//!
//! - [`mocks::ScriptedChannel`] — replays a script of wait outcomes and records
//!   every channel interaction
//! - [`mocks::RecordingNotifier`] — records dispatched event names in order and
//!   answers idle events from a queue of force-stop responses
//! - [`mocks::OutcomeHandler`] — returns a fixed outcome and counts invocations
//! - [`mocks::FailingHandler`] — always raises a handler fault
//!
//! ## Example
//!
//! ```ignore
//! use conveyor_testing::mocks::{OutcomeHandler, RecordingNotifier, ScriptedChannel};
//!
//! #[tokio::test]
//! async fn consumes_two_deliveries() {
//!     let channel = Arc::new(ScriptedChannel::new());
//!     channel.push_delivery(Delivery::new(1, b"a".to_vec()));
//!     channel.push_delivery(Delivery::new(2, b"b".to_vec()));
//!
//!     let mut consumer = Consumer::new(channel.clone(), Arc::new(OutcomeHandler::ack()));
//!     assert_eq!(consumer.consume(2).await.unwrap(), 0);
//!     assert_eq!(channel.acked(), vec![1, 2]);
//! }
//! ```

pub mod mocks {
    //! Mock implementations of the Conveyor contracts.

    use conveyor_core::channel::{
        Channel, ChannelError, ChannelFuture, ConsumeOptions, QosOptions, WaitOutcome,
    };
    use conveyor_core::delivery::Delivery;
    use conveyor_core::handler::{DeliveryHandler, HandlerError, HandlerFuture};
    use conveyor_core::notifier::{ConsumerEvent, Notifier};
    use conveyor_core::outcome::ProcessingOutcome;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // A poisoned mutex means a test already panicked; propagate its view.
    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// One step in a [`ScriptedChannel`] wait script.
    #[derive(Debug)]
    enum WaitStep {
        Deliver(Delivery),
        TimeOut,
        Fail(String),
    }

    /// A [`Channel`] whose `wait` replays a pre-loaded script.
    ///
    /// Every interaction is recorded: fabric setups, QoS calls, registrations,
    /// wait bounds, acks, and rejects. An exhausted script fails the wait with a
    /// transport error so a runaway loop surfaces as a test failure instead of a
    /// hang.
    #[derive(Debug, Default)]
    pub struct ScriptedChannel {
        script: Mutex<VecDeque<WaitStep>>,
        fabric_setups: AtomicUsize,
        qos_calls: Mutex<Vec<QosOptions>>,
        registrations: Mutex<Vec<ConsumeOptions>>,
        wait_bounds: Mutex<Vec<Option<Duration>>>,
        acks: Mutex<Vec<u64>>,
        rejects: Mutex<Vec<(u64, bool)>>,
    }

    impl ScriptedChannel {
        /// An empty channel; script steps are pushed before the test runs.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a delivery to the wait script.
        pub fn push_delivery(&self, delivery: Delivery) {
            lock(&self.script).push_back(WaitStep::Deliver(delivery));
        }

        /// Append `count` deliveries with sequential tags starting at 1.
        pub fn push_deliveries(&self, count: u64) {
            let mut script = lock(&self.script);
            for tag in 1..=count {
                script.push_back(WaitStep::Deliver(Delivery::new(tag, vec![])));
            }
        }

        /// Append a timed-out wait to the script.
        pub fn push_timeout(&self) {
            lock(&self.script).push_back(WaitStep::TimeOut);
        }

        /// Append a transport failure to the script.
        pub fn push_failure(&self, reason: impl Into<String>) {
            lock(&self.script).push_back(WaitStep::Fail(reason.into()));
        }

        /// Number of `setup_fabric` calls observed.
        pub fn fabric_setups(&self) -> usize {
            self.fabric_setups.load(Ordering::SeqCst)
        }

        /// QoS options observed, in call order.
        pub fn qos_calls(&self) -> Vec<QosOptions> {
            lock(&self.qos_calls).clone()
        }

        /// Consumer registrations observed, in call order.
        pub fn registrations(&self) -> Vec<ConsumeOptions> {
            lock(&self.registrations).clone()
        }

        /// The timeout bound passed to each `wait` call, in call order.
        pub fn wait_bounds(&self) -> Vec<Option<Duration>> {
            lock(&self.wait_bounds).clone()
        }

        /// Number of `wait` calls observed.
        pub fn wait_calls(&self) -> usize {
            lock(&self.wait_bounds).len()
        }

        /// Delivery tags acked, in call order.
        pub fn acked(&self) -> Vec<u64> {
            lock(&self.acks).clone()
        }

        /// `(delivery_tag, requeue)` pairs rejected, in call order.
        pub fn rejected(&self) -> Vec<(u64, bool)> {
            lock(&self.rejects).clone()
        }
    }

    impl Channel for ScriptedChannel {
        fn setup_fabric(&self) -> ChannelFuture<'_, ()> {
            self.fabric_setups.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn qos(&self, options: &QosOptions) -> ChannelFuture<'_, ()> {
            lock(&self.qos_calls).push(*options);
            Box::pin(async { Ok(()) })
        }

        fn register_consumer(&self, options: &ConsumeOptions) -> ChannelFuture<'_, ()> {
            lock(&self.registrations).push(options.clone());
            Box::pin(async { Ok(()) })
        }

        fn wait(&self, timeout: Option<Duration>) -> ChannelFuture<'_, WaitOutcome> {
            lock(&self.wait_bounds).push(timeout);
            let step = lock(&self.script).pop_front();
            Box::pin(async move {
                match step {
                    Some(WaitStep::Deliver(delivery)) => Ok(WaitOutcome::Delivery(delivery)),
                    Some(WaitStep::TimeOut) => Ok(WaitOutcome::TimedOut),
                    Some(WaitStep::Fail(reason)) => Err(ChannelError::TransportError(reason)),
                    None => Err(ChannelError::TransportError(
                        "scripted channel exhausted".to_string(),
                    )),
                }
            })
        }

        fn ack(&self, delivery_tag: u64) -> ChannelFuture<'_, ()> {
            lock(&self.acks).push(delivery_tag);
            Box::pin(async { Ok(()) })
        }

        fn reject(&self, delivery_tag: u64, requeue: bool) -> ChannelFuture<'_, ()> {
            lock(&self.rejects).push((delivery_tag, requeue));
            Box::pin(async { Ok(()) })
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    /// A [`Notifier`] that records event names in dispatch order.
    ///
    /// Idle events are answered from a queue of force-stop responses; once the
    /// queue is empty the default `false` is left in place (the loop continues).
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<String>>,
        idle_responses: Mutex<VecDeque<bool>>,
    }

    impl RecordingNotifier {
        /// A notifier that records everything and never requests stop.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a force-stop response for the next unanswered idle event.
        pub fn push_idle_response(&self, force_stop: bool) {
            lock(&self.idle_responses).push_back(force_stop);
        }

        /// Names of the events dispatched so far, in order.
        pub fn event_names(&self) -> Vec<String> {
            lock(&self.events).clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn dispatch(&self, event: &mut ConsumerEvent<'_>) {
            lock(&self.events).push(event.name().to_string());
            if let ConsumerEvent::OnIdle { force_stop } = event {
                if let Some(stop) = lock(&self.idle_responses).pop_front() {
                    *force_stop = stop;
                }
            }
        }
    }

    /// A [`DeliveryHandler`] that returns a fixed outcome and counts calls.
    #[derive(Debug)]
    pub struct OutcomeHandler {
        outcome: ProcessingOutcome,
        calls: AtomicUsize,
    }

    impl OutcomeHandler {
        /// A handler that always returns the given outcome.
        #[must_use]
        pub const fn new(outcome: ProcessingOutcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
            }
        }

        /// A handler that acknowledges everything.
        #[must_use]
        pub const fn ack() -> Self {
            Self::new(ProcessingOutcome::Ack)
        }

        /// Number of deliveries handled so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DeliveryHandler for OutcomeHandler {
        fn handle<'a>(&'a self, _delivery: &'a Delivery) -> HandlerFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome;
            Box::pin(async move { Ok(outcome) })
        }
    }

    /// A [`DeliveryHandler`] that always fails with the given message.
    #[derive(Debug)]
    pub struct FailingHandler {
        message: String,
    }

    impl FailingHandler {
        /// A handler whose every invocation raises `message` as a fault.
        #[must_use]
        pub fn new(message: impl Into<String>) -> Self {
            Self {
                message: message.into(),
            }
        }
    }

    impl DeliveryHandler for FailingHandler {
        fn handle<'a>(&'a self, _delivery: &'a Delivery) -> HandlerFuture<'a> {
            let message = self.message.clone();
            Box::pin(async move { Err(HandlerError::from(message)) })
        }
    }
}

pub use mocks::{FailingHandler, OutcomeHandler, RecordingNotifier, ScriptedChannel};

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use conveyor_core::channel::{Channel, WaitOutcome};
    use conveyor_core::delivery::Delivery;
    use conveyor_core::notifier::{ConsumerEvent, Notifier};

    #[tokio::test]
    async fn scripted_channel_replays_steps_in_order() {
        let channel = ScriptedChannel::new();
        channel.push_delivery(Delivery::new(1, vec![]));
        channel.push_timeout();

        assert!(matches!(
            channel.wait(None).await,
            Ok(WaitOutcome::Delivery(d)) if d.delivery_tag == 1
        ));
        assert!(matches!(channel.wait(None).await, Ok(WaitOutcome::TimedOut)));
        assert!(channel.wait(None).await.is_err());
        assert_eq!(channel.wait_calls(), 3);
    }

    #[tokio::test]
    async fn scripted_channel_records_acknowledgements() {
        let channel = ScriptedChannel::new();

        channel.ack(1).await.ok();
        channel.reject(2, true).await.ok();
        channel.reject(3, false).await.ok();

        assert_eq!(channel.acked(), vec![1]);
        assert_eq!(channel.rejected(), vec![(2, true), (3, false)]);
    }

    #[test]
    fn recording_notifier_answers_idle_events_from_the_queue() {
        let notifier = RecordingNotifier::new();
        notifier.push_idle_response(false);
        notifier.push_idle_response(true);

        let mut first = ConsumerEvent::OnIdle { force_stop: false };
        notifier.dispatch(&mut first);
        assert!(matches!(first, ConsumerEvent::OnIdle { force_stop: false }));

        let mut second = ConsumerEvent::OnIdle { force_stop: false };
        notifier.dispatch(&mut second);
        assert!(matches!(second, ConsumerEvent::OnIdle { force_stop: true }));

        // Queue exhausted: the default is left in place.
        let mut third = ConsumerEvent::OnIdle { force_stop: false };
        notifier.dispatch(&mut third);
        assert!(matches!(third, ConsumerEvent::OnIdle { force_stop: false }));

        assert_eq!(notifier.event_names(), vec!["on_idle"; 3]);
    }
}
