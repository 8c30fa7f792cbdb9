//! Check-event intake from the scheduler pipeline.
//!
//! The scheduler feeds completed checks through a channel; the intake loop
//! drains it until the sending side disconnects. The stream is live, so one
//! event naming an unknown object is recorded and skipped rather than
//! stopping the loop.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::engine::{CheckEvent, MonitorCore};
use crate::logger::StateEventKind;

/// Apply events until the channel disconnects. Returns how many were
/// applied.
pub fn run_intake(core: &MonitorCore, events: &Receiver<CheckEvent>) -> usize {
    let mut applied = 0;
    for event in events.iter() {
        match core.apply_check_event(&event) {
            Ok(()) => applied += 1,
            Err(err) if err.is_not_found() => {
                let kind = match &event.target {
                    crate::engine::EventTarget::Host { .. } => "host",
                    crate::engine::EventTarget::Service { .. } => "service",
                };
                core.emit_at(
                    event.timestamp,
                    kind,
                    event.target.name(),
                    StateEventKind::CheckDiscarded {
                        reason: err.to_string(),
                    },
                );
            }
            Err(_) => {}
        }
    }
    applied
}

/// Spawn the intake loop on its own thread.
#[must_use]
pub fn spawn_intake(core: Arc<MonitorCore>, events: Receiver<CheckEvent>) -> JoinHandle<usize> {
    std::thread::spawn(move || run_intake(&core, &events))
}
