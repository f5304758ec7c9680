//! Hand-off point between the detection loop and the overlay renderer.
//!
//! The loop is the only producer and the renderer the only consumer. Each publish
//! swaps in a whole new collection and bumps the generation, so a reader never
//! observes a half-updated set.

use std::sync::Arc;

use crate::detect::Detection;

/// Immutable snapshot of one published detection set.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub detections: Arc<[Detection]>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            detections: Arc::from(Vec::new()),
        }
    }
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Latest published detection set.
#[derive(Debug, Default)]
pub struct PublishedSet {
    current: Snapshot,
}

impl PublishedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set. Returns the new generation.
    pub fn publish(&mut self, detections: Vec<Detection>) -> u64 {
        self.current = Snapshot {
            generation: self.current.generation + 1,
            detections: detections.into(),
        };
        self.current.generation
    }

    /// Drop all detections (publishes an empty set).
    pub fn clear(&mut self) -> u64 {
        self.publish(Vec::new())
    }

    pub fn generation(&self) -> u64 {
        self.current.generation
    }

    pub fn snapshot(&self) -> Snapshot {
        self.current.clone()
    }

    /// Snapshot only when the generation moved past `seen`.
    pub fn changed_since(&self, seen: u64) -> Option<Snapshot> {
        (self.current.generation != seen).then(|| self.snapshot())
    }
}
