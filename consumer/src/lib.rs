//! # Conveyor Consumer
//!
//! The consume loop and its acknowledgement/timeout state machine.
//!
//! A [`Consumer`] pulls deliveries off a [`Channel`], hands each to a
//! [`DeliveryHandler`], and translates the handler's [`ProcessingOutcome`] into
//! broker acknowledgement actions. Around each transition it dispatches
//! lifecycle events through a [`Notifier`].
//!
//! ## Two timeout tracks
//!
//! - **Idle timeout**: the bounded wait duration after which "no delivery
//!   arrived" is signalled. Transient by default — the loop dispatches an
//!   `on_idle` event and waits again unless a handler sets the event's
//!   `force_stop` flag.
//! - **Graceful max-execution timeout**: an absolute wall-clock deadline after
//!   which the loop exits cleanly with a configured code instead of waiting
//!   again. Checked before every wait; a wait is never attempted once the
//!   deadline has been reached.
//!
//! ## Example
//!
//! ```ignore
//! use conveyor_consumer::Consumer;
//! use conveyor_core::ConsumeOptions;
//! use std::time::Duration;
//!
//! let mut consumer = Consumer::new(channel, handler);
//! consumer.set_consume_options(ConsumeOptions::queue("jobs"));
//! consumer.set_idle_timeout(Duration::from_secs(30));
//! consumer.set_idle_timeout_exit_code(2);
//! consumer.set_graceful_max_execution_timeout(Duration::from_secs(3600));
//! consumer.set_graceful_max_execution_timeout_exit_code(10);
//!
//! let exit_code = consumer.consume(0).await?;
//! std::process::exit(exit_code);
//! ```
//!
//! ## Concurrency model
//!
//! Strictly sequential and cooperative: one delivery is fully processed (both
//! events dispatched, ack/reject issued) before the next wait begins. The only
//! suspension point is the bounded wait on the channel. Multiple consumers are
//! fully independent and share nothing.

use conveyor_core::channel::{Channel, ConsumeOptions, QosOptions, WaitOutcome};
use conveyor_core::delivery::Delivery;
use conveyor_core::handler::DeliveryHandler;
use conveyor_core::notifier::{ConsumerEvent, NoopNotifier, Notifier};
use conveyor_core::outcome::ProcessingOutcome;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Error types for the consume loop
pub mod error {
    use thiserror::Error;

    /// Errors that can escape [`Consumer::consume`](crate::Consumer::consume).
    ///
    /// Expected conditions — idle timeouts and the graceful deadline — are not
    /// errors; they surface as exit codes. Everything here is a genuine fault
    /// that bubbles up unmodified for the surrounding process to decide on.
    #[derive(Error, Debug)]
    pub enum ConsumeError {
        /// A channel operation failed for a reason distinct from a timeout.
        ///
        /// The loop performs no transport retries itself.
        #[error("Channel error: {0}")]
        Channel(#[from] conveyor_core::channel::ChannelError),

        /// The delivery handler raised a fault.
        ///
        /// No ack or reject was issued for the delivery that triggered it; the
        /// broker's redelivery-on-disconnect behaviour is the recovery path.
        #[error("Delivery handler failed: {0}")]
        Handler(#[from] conveyor_core::handler::HandlerError),
    }
}

pub use error::ConsumeError;

/// Exit code for normal termination (the consumption limit was reached).
pub const EXIT_NORMAL: i32 = 0;

/// Which timeout track supplied the bound for a wait call.
///
/// Recorded at selection time so that an elapsed wait can be attributed to the
/// right track: idle timeouts dispatch `on_idle`, graceful timeouts exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimeoutTrack {
    Idle,
    Graceful,
}

/// The wait decision made at the top of each loop iteration.
#[derive(Debug)]
enum NextWait {
    /// The graceful deadline is at or in the past; exit without waiting.
    DeadlinePassed,
    /// Wait with this bound, attributing a timeout to this track.
    Wait(Option<Duration>, TimeoutTrack),
}

/// Select the bound for the next wait from the two timeout tracks.
///
/// The bound is the minimum of the idle timeout and the time remaining until
/// the graceful deadline. With no deadline the idle track always wins; with no
/// idle timeout the remaining-time bound is attributed to the graceful track.
fn select_wait(
    idle_timeout: Option<Duration>,
    deadline: Option<Instant>,
    now: Instant,
) -> NextWait {
    let Some(deadline) = deadline else {
        return NextWait::Wait(idle_timeout, TimeoutTrack::Idle);
    };

    if now >= deadline {
        return NextWait::DeadlinePassed;
    }

    let remaining = deadline - now;
    match idle_timeout {
        Some(idle) if idle < remaining => NextWait::Wait(Some(idle), TimeoutTrack::Idle),
        _ => NextWait::Wait(Some(remaining), TimeoutTrack::Graceful),
    }
}

/// A message-queue consumer: owns the consume loop, the callback contract, the
/// ack/reject decision logic, and both timeout tracks.
///
/// Constructed once, configured via setters before [`Consumer::consume`] is
/// invoked, and mutated only from within the loop.
pub struct Consumer {
    channel: Arc<dyn Channel>,
    handler: Arc<dyn DeliveryHandler>,
    notifier: Arc<dyn Notifier>,
    options: ConsumeOptions,
    qos: Option<QosOptions>,
    idle_timeout: Option<Duration>,
    idle_timeout_exit_code: i32,
    graceful_deadline: Option<Instant>,
    graceful_timeout_exit_code: i32,
    auto_setup_fabric: bool,
    consumed: u64,
}

impl Consumer {
    /// Create a consumer over a channel with the given processing logic.
    ///
    /// Defaults: no idle timeout (waits block indefinitely), no graceful
    /// deadline, both exit codes 0, fabric auto-setup enabled, no-op notifier,
    /// broker-default consume options.
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, handler: Arc<dyn DeliveryHandler>) -> Self {
        Self {
            channel,
            handler,
            notifier: Arc::new(NoopNotifier),
            options: ConsumeOptions::default(),
            qos: None,
            idle_timeout: None,
            idle_timeout_exit_code: EXIT_NORMAL,
            graceful_deadline: None,
            graceful_timeout_exit_code: EXIT_NORMAL,
            auto_setup_fabric: true,
            consumed: 0,
        }
    }

    /// Replace the lifecycle-event notifier.
    pub fn set_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifier = notifier;
    }

    /// Set the consumer registration options (queue, tag, exclusivity flags).
    pub fn set_consume_options(&mut self, options: ConsumeOptions) {
        self.options = options;
    }

    /// Set quality-of-service limits to apply before consuming.
    pub fn set_qos_options(&mut self, qos: QosOptions) {
        self.qos = Some(qos);
    }

    /// Bound each wait call; a wait that elapses dispatches an `on_idle` event.
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = Some(timeout);
    }

    /// The exit code returned when an idle-event handler requests stop.
    pub fn set_idle_timeout_exit_code(&mut self, code: i32) {
        self.idle_timeout_exit_code = code;
    }

    /// Set the graceful max-execution deadline to `from_now` in the future,
    /// resolved against the wall clock at call time.
    pub fn set_graceful_max_execution_timeout(&mut self, from_now: Duration) {
        self.graceful_deadline = Some(Instant::now() + from_now);
    }

    /// The exit code returned when the graceful deadline has been reached.
    pub fn set_graceful_max_execution_timeout_exit_code(&mut self, code: i32) {
        self.graceful_timeout_exit_code = code;
    }

    /// Skip broker topology declaration on the next `consume` call.
    pub fn disable_auto_setup_fabric(&mut self) {
        self.auto_setup_fabric = false;
    }

    /// The configured idle timeout, if any.
    #[must_use]
    pub const fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Deliveries successfully handled during the current `consume` invocation.
    #[must_use]
    pub const fn consumed_count(&self) -> u64 {
        self.consumed
    }

    /// Run the consume loop until `limit` deliveries have been handled, an
    /// idle-event handler requests stop, or the graceful deadline is reached.
    ///
    /// `limit == 0` consumes indefinitely. Returns the process exit code the
    /// surrounding binary should adopt: [`EXIT_NORMAL`] when the limit is
    /// reached, otherwise the configured idle or graceful code.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError::Channel`] for transport faults and
    /// [`ConsumeError::Handler`] for handler faults; neither is retried here.
    #[tracing::instrument(skip(self), fields(queue = %self.options.queue))]
    pub async fn consume(&mut self, limit: u64) -> Result<i32, ConsumeError> {
        if !self.channel.is_ready() {
            tracing::warn!("Channel transport reports not ready before registration");
        }
        if self.auto_setup_fabric {
            self.channel.setup_fabric().await?;
        }
        if let Some(qos) = self.qos {
            self.channel.qos(&qos).await?;
        }
        self.channel.register_consumer(&self.options).await?;
        self.consumed = 0;

        tracing::info!(limit, "Consumer registered, entering consume loop");

        loop {
            if limit > 0 && self.consumed >= limit {
                tracing::info!(consumed = self.consumed, "Consumption limit reached");
                return Ok(EXIT_NORMAL);
            }

            let (bound, track) =
                match select_wait(self.idle_timeout, self.graceful_deadline, Instant::now()) {
                    NextWait::DeadlinePassed => {
                        tracing::info!(
                            exit_code = self.graceful_timeout_exit_code,
                            "Graceful max-execution deadline reached, not waiting again"
                        );
                        return Ok(self.graceful_timeout_exit_code);
                    }
                    NextWait::Wait(bound, track) => (bound, track),
                };

            match self.channel.wait(bound).await? {
                WaitOutcome::Delivery(delivery) => {
                    let mut event = ConsumerEvent::OnConsume {
                        delivery: &delivery,
                    };
                    self.notifier.dispatch(&mut event);

                    self.process_message(&delivery).await?;
                    self.consumed += 1;
                }
                WaitOutcome::TimedOut => match track {
                    TimeoutTrack::Graceful => {
                        tracing::info!(
                            exit_code = self.graceful_timeout_exit_code,
                            "Wait ran out the graceful max-execution budget"
                        );
                        return Ok(self.graceful_timeout_exit_code);
                    }
                    TimeoutTrack::Idle => {
                        if self.dispatch_idle() {
                            tracing::info!(
                                exit_code = self.idle_timeout_exit_code,
                                "Idle-event handler requested stop"
                            );
                            return Ok(self.idle_timeout_exit_code);
                        }
                        tracing::debug!("Idle timeout was transient, waiting again");
                    }
                },
            }
        }
    }

    /// Process one delivery: dispatch the before event, run the handler, issue
    /// the acknowledgement action its outcome maps to, dispatch the after event.
    ///
    /// # Errors
    ///
    /// A handler fault propagates as [`ConsumeError::Handler`] — the after
    /// event is not dispatched and no ack or reject is issued for the delivery.
    /// A failed ack/reject propagates as [`ConsumeError::Channel`].
    #[tracing::instrument(skip(self, delivery), fields(delivery_tag = delivery.delivery_tag))]
    pub async fn process_message(&self, delivery: &Delivery) -> Result<(), ConsumeError> {
        let mut event = ConsumerEvent::BeforeProcessing { delivery };
        self.notifier.dispatch(&mut event);

        let outcome = self.handler.handle(delivery).await?;
        self.apply_outcome(delivery, outcome).await?;

        let mut event = ConsumerEvent::AfterProcessing { delivery };
        self.notifier.dispatch(&mut event);

        Ok(())
    }

    /// Translate an outcome into exactly one channel action, or none for
    /// [`ProcessingOutcome::DeferredAck`].
    async fn apply_outcome(
        &self,
        delivery: &Delivery,
        outcome: ProcessingOutcome,
    ) -> Result<(), ConsumeError> {
        match outcome {
            ProcessingOutcome::Ack => {
                self.channel.ack(delivery.delivery_tag).await?;
                tracing::debug!(delivery_tag = delivery.delivery_tag, "Delivery acked");
            }
            ProcessingOutcome::RejectRequeue => {
                self.channel.reject(delivery.delivery_tag, true).await?;
                tracing::debug!(
                    delivery_tag = delivery.delivery_tag,
                    "Delivery rejected and requeued"
                );
            }
            ProcessingOutcome::RejectDrop => {
                self.channel.reject(delivery.delivery_tag, false).await?;
                tracing::debug!(
                    delivery_tag = delivery.delivery_tag,
                    "Delivery rejected and dropped"
                );
            }
            ProcessingOutcome::DeferredAck => {
                tracing::trace!(
                    delivery_tag = delivery.delivery_tag,
                    "Acknowledgement deferred to the handler"
                );
            }
        }
        Ok(())
    }

    /// Dispatch the idle event and read the force-stop flag back.
    fn dispatch_idle(&self) -> bool {
        let mut event = ConsumerEvent::OnIdle { force_stop: false };
        self.notifier.dispatch(&mut event);
        matches!(event, ConsumerEvent::OnIdle { force_stop: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn no_deadline_waits_on_the_idle_track() {
        let now = Instant::now();

        let next = select_wait(Some(30 * SECOND), None, now);
        assert!(matches!(
            next,
            NextWait::Wait(Some(t), TimeoutTrack::Idle) if t == 30 * SECOND
        ));

        let next = select_wait(None, None, now);
        assert!(matches!(next, NextWait::Wait(None, TimeoutTrack::Idle)));
    }

    #[test]
    fn passed_deadline_suppresses_the_wait() {
        let now = Instant::now();

        assert!(matches!(
            select_wait(Some(SECOND), Some(now), now),
            NextWait::DeadlinePassed
        ));
        assert!(matches!(
            select_wait(None, Some(now - SECOND), now),
            NextWait::DeadlinePassed
        ));
    }

    #[test]
    fn tighter_idle_timeout_wins_over_the_deadline() {
        let now = Instant::now();
        let deadline = now + 60 * SECOND;

        let next = select_wait(Some(5 * SECOND), Some(deadline), now);
        assert!(matches!(
            next,
            NextWait::Wait(Some(t), TimeoutTrack::Idle) if t == 5 * SECOND
        ));
    }

    #[test]
    fn nearer_deadline_wins_over_the_idle_timeout() {
        let now = Instant::now();
        let deadline = now + 5 * SECOND;

        let next = select_wait(Some(60 * SECOND), Some(deadline), now);
        assert!(matches!(
            next,
            NextWait::Wait(Some(t), TimeoutTrack::Graceful) if t == 5 * SECOND
        ));
    }

    #[test]
    fn deadline_alone_bounds_the_wait_on_the_graceful_track() {
        let now = Instant::now();
        let deadline = now + 60 * SECOND;

        let next = select_wait(None, Some(deadline), now);
        assert!(matches!(
            next,
            NextWait::Wait(Some(t), TimeoutTrack::Graceful) if t == 60 * SECOND
        ));
    }
}
