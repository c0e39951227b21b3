// THEORY:
// The engine reports progress by pushing one `DeploymentEvent` per placement or
// optimization step into a `Notifier`. It holds the notifier only as a trait
// object and never waits on it, so a UI, a log or a test can subscribe without
// the core knowing which. Nothing outside the running task reads the engine's
// state while it works; progress travels through these events only.
//
// Cancellation is the reverse channel: a `CancelToken` shared with the caller is
// polled between discrete steps, so a cancelled run stops after the step in
// flight and leaves a consistent deployment behind.

use crate::core_modules::geometry::Position;
use crate::core_modules::sensor::SensorId;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Which routine produced an event or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Greedy,
    Random,
    /// Jittered placement next to existing sensors once candidates run out.
    FillRemaining,
    Manual,
    Annealing,
    Genetic,
}

/// A single observable step of a deployment run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeploymentEvent {
    SensorPlaced {
        strategy: Strategy,
        id: SensorId,
        position: Position,
        priority: f64,
    },
    AnnealingStep {
        step: u64,
        id: SensorId,
        from: Position,
        to: Position,
        priority: f64,
        accepted: bool,
        mean_priority: f64,
        temperature: f64,
    },
    GenerationEvaluated {
        generation: usize,
        best_fitness: f64,
        mean_fitness: f64,
    },
    Completed {
        strategy: Strategy,
        total_priority: f64,
        cancelled: bool,
    },
}

/// Receives engine events. Must return promptly.
pub trait Notifier {
    fn notify(&self, event: &DeploymentEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &DeploymentEvent) {}
}

/// Writes events to the `tracing` subscriber. The default notifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &DeploymentEvent) {
        match event {
            DeploymentEvent::SensorPlaced {
                strategy,
                id,
                position,
                priority,
            } => {
                tracing::debug!(?strategy, id, x = position.x, y = position.y, priority, "sensor placed");
            }
            DeploymentEvent::AnnealingStep {
                step,
                id,
                to,
                accepted,
                mean_priority,
                temperature,
                ..
            } => {
                tracing::trace!(step, id, x = to.x, y = to.y, accepted, mean_priority, temperature, "annealing step");
            }
            DeploymentEvent::GenerationEvaluated {
                generation,
                best_fitness,
                mean_fitness,
            } => {
                tracing::debug!(generation, best_fitness, mean_fitness, "generation evaluated");
            }
            DeploymentEvent::Completed {
                strategy,
                total_priority,
                cancelled,
            } => {
                tracing::info!(?strategy, total_priority, cancelled, "deployment finished");
            }
        }
    }
}

/// Forwards events into an unbounded tokio channel. Sending never blocks; once
/// the receiver is dropped events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<DeploymentEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<DeploymentEvent>) -> Self {
        Self { sender }
    }

    /// Creates a notifier together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DeploymentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: &DeploymentEvent) {
        let _ = self.sender.send(event.clone());
    }
}

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_delivers_in_order_and_survives_dropped_receiver() {
        let (notifier, mut receiver) = ChannelNotifier::channel();
        for id in 0..3 {
            notifier.notify(&DeploymentEvent::SensorPlaced {
                strategy: Strategy::Greedy,
                id,
                position: Position::new(1, 1),
                priority: 0.5,
            });
        }
        let ids: Vec<SensorId> = std::iter::from_fn(|| receiver.try_recv().ok())
            .filter_map(|e| match e {
                DeploymentEvent::SensorPlaced { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);

        drop(receiver);
        notifier.notify(&DeploymentEvent::Completed {
            strategy: Strategy::Greedy,
            total_priority: 1.0,
            cancelled: false,
        });
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
        observer.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_string(&DeploymentEvent::Completed {
            strategy: Strategy::FillRemaining,
            total_priority: 2.0,
            cancelled: false,
        })
        .expect("serializable");
        assert_eq!(
            json,
            r#"{"event":"completed","strategy":"fill_remaining","total_priority":2.0,"cancelled":false}"#
        );
    }
}
