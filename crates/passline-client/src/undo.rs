use chrono::{DateTime, Duration, Utc};
use passline_core::config::UNDO_WINDOW_SECS;
use passline_core::types::{OrderId, OrderStatus};

/// The single most recent reversible mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoToken {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Offers a time-bounded reversal of the last optimistic mutation.
///
/// Undo is itself a mutation, not a history rollback: taking the token
/// re-applies `previous_status` as a fresh forward mutation. Only one
/// token is live at a time — any newer mutation, on any order, discards it.
#[derive(Debug, Default)]
pub struct UndoCoordinator {
    token: Option<UndoToken>,
}

impl UndoCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the previous value of a just-applied mutation.
    pub fn record(
        &mut self,
        order_id: OrderId,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) {
        self.token = Some(UndoToken {
            order_id,
            previous_status,
            new_status,
            recorded_at: now,
        });
    }

    /// Whether the undo affordance should be visible.
    pub fn available(&self, now: DateTime<Utc>) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| now - t.recorded_at < Duration::seconds(UNDO_WINDOW_SECS))
    }

    /// Consume the token if still within the window. Expired tokens are
    /// cleared either way.
    pub fn take(&mut self, now: DateTime<Utc>) -> Option<UndoToken> {
        let token = self.token.take()?;
        if now - token.recorded_at < Duration::seconds(UNDO_WINDOW_SECS) {
            Some(token)
        } else {
            None
        }
    }

    /// A newer mutation supersedes whatever reversal was on offer.
    pub fn invalidate(&mut self) {
        self.token = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn take_within_window_returns_token() {
        let mut undo = UndoCoordinator::new();
        undo.record(
            OrderId::from("o-1"),
            OrderStatus::New,
            OrderStatus::Preparing,
            t0(),
        );

        assert!(undo.available(t0() + Duration::seconds(5)));
        let token = undo.take(t0() + Duration::seconds(5)).unwrap();
        assert_eq!(token.previous_status, OrderStatus::New);
        // consumed — nothing left to take
        assert!(undo.take(t0() + Duration::seconds(6)).is_none());
    }

    #[test]
    fn expired_token_is_not_returned() {
        let mut undo = UndoCoordinator::new();
        undo.record(
            OrderId::from("o-1"),
            OrderStatus::New,
            OrderStatus::Preparing,
            t0(),
        );

        assert!(!undo.available(t0() + Duration::seconds(10)));
        assert!(undo.take(t0() + Duration::seconds(10)).is_none());
    }

    #[test]
    fn newer_mutation_supersedes_token() {
        let mut undo = UndoCoordinator::new();
        undo.record(
            OrderId::from("o-1"),
            OrderStatus::New,
            OrderStatus::Preparing,
            t0(),
        );
        undo.record(
            OrderId::from("o-2"),
            OrderStatus::Preparing,
            OrderStatus::Ready,
            t0() + Duration::seconds(1),
        );

        let token = undo.take(t0() + Duration::seconds(2)).unwrap();
        assert_eq!(token.order_id, OrderId::from("o-2"));
    }
}
