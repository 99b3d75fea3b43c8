//! The outcome a handler returns for one delivery.
//!
//! An outcome is not a broker primitive — the consume loop translates it into
//! broker acknowledgement actions. It is an explicit tagged enumeration with
//! [`ProcessingOutcome::Ack`] as the default; handlers that only signal
//! success or failure map through `From<bool>` instead of truthiness coercion.

/// What should happen to a delivery after the handler has run.
///
/// | outcome         | broker action           |
/// |-----------------|-------------------------|
/// | `Ack`           | ack                     |
/// | `RejectRequeue` | reject, requeue = true  |
/// | `RejectDrop`    | reject, requeue = false |
/// | `DeferredAck`   | none — the handler acknowledges later itself |
///
/// # Examples
///
/// ```
/// use conveyor_core::ProcessingOutcome;
///
/// // Handlers that only signal success/failure map through `From<bool>`:
/// assert_eq!(ProcessingOutcome::from(true), ProcessingOutcome::Ack);
/// assert_eq!(ProcessingOutcome::from(false), ProcessingOutcome::RejectRequeue);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// Acknowledge the delivery, removing it permanently from the queue.
    #[default]
    Ack,

    /// Reject the delivery and requeue it for redelivery.
    RejectRequeue,

    /// Reject the delivery and drop it (dead-letter it if the broker is so configured).
    RejectDrop,

    /// Issue no acknowledgement — the handler is trusted to ack the delivery later.
    DeferredAck,
}

impl ProcessingOutcome {
    /// Whether the consume loop issues an acknowledgement action for this outcome.
    #[must_use]
    pub const fn acknowledges(self) -> bool {
        !matches!(self, Self::DeferredAck)
    }
}

impl From<bool> for ProcessingOutcome {
    /// `true` acks; `false` rejects and requeues.
    fn from(success: bool) -> Self {
        if success {
            Self::Ack
        } else {
            Self::RejectRequeue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_outcome_is_ack() {
        assert_eq!(ProcessingOutcome::default(), ProcessingOutcome::Ack);
    }

    #[test]
    fn bool_mapping_matches_decision_table() {
        assert_eq!(ProcessingOutcome::from(true), ProcessingOutcome::Ack);
        assert_eq!(
            ProcessingOutcome::from(false),
            ProcessingOutcome::RejectRequeue
        );
    }

    #[test]
    fn only_deferred_ack_skips_acknowledgement() {
        assert!(ProcessingOutcome::Ack.acknowledges());
        assert!(ProcessingOutcome::RejectRequeue.acknowledges());
        assert!(ProcessingOutcome::RejectDrop.acknowledges());
        assert!(!ProcessingOutcome::DeferredAck.acknowledges());
    }
}
