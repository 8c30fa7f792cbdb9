//! Expiry-aware acknowledgement tracking.
//!
//! Expiry is lazy: no timer fires. A read that finds a stale expiry clears
//! both the type and the expiry as a side effect, under the checkable's
//! mutex so it cannot interleave with a concurrent set.

use chrono::{DateTime, Utc};

use crate::engine::MonitorCore;
use crate::logger::StateEventKind;
use crate::objects::checkable::{Acknowledgement, CheckableRef};

impl MonitorCore {
    /// Current acknowledgement, applying lazy expiry against the wall
    /// clock.
    #[must_use]
    pub fn acknowledgement(&self, target: &CheckableRef) -> Acknowledgement {
        self.acknowledgement_at(target, Utc::now())
    }

    /// Current acknowledgement against an explicit clock. When the stored
    /// type is non-None and its expiry has passed, both fields are cleared
    /// before returning None; the clear is persisted, not just reported.
    #[must_use]
    pub fn acknowledgement_at(
        &self,
        target: &CheckableRef,
        now: DateTime<Utc>,
    ) -> Acknowledgement {
        let (acknowledgement, expired) = target.with_state(|state| {
            if state.acknowledgement == Acknowledgement::None {
                return (Acknowledgement::None, false);
            }
            if let Some(expiry) = state.acknowledgement_expiry
                && expiry < now
            {
                state.acknowledgement = Acknowledgement::None;
                state.acknowledgement_expiry = None;
                return (Acknowledgement::None, true);
            }
            (state.acknowledgement, false)
        });
        if expired {
            self.emit_at(
                now,
                target.kind(),
                target.name(),
                StateEventKind::AcknowledgementExpired,
            );
        }
        acknowledgement
    }

    /// Store an acknowledgement. Does not touch the expiry — callers may
    /// pre-set an expiry before acknowledging; clearing both is the
    /// caller's job (or the lazy-expiry path's).
    pub fn set_acknowledgement(&self, target: &CheckableRef, acknowledgement: Acknowledgement) {
        target.with_state(|state| state.acknowledgement = acknowledgement);
        self.emit(
            target.kind(),
            target.name(),
            StateEventKind::AcknowledgementSet { acknowledgement },
        );
    }

    /// Store or clear the acknowledgement expiry. `None` means the
    /// acknowledgement never expires.
    pub fn set_acknowledgement_expiry(
        &self,
        target: &CheckableRef,
        expiry: Option<DateTime<Utc>>,
    ) {
        target.with_state(|state| state.acknowledgement_expiry = expiry);
    }
}
