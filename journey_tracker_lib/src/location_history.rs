use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Ordered record of the samples captured during one tracking session.
///
/// Insertion order is capture order. The history is owned by the session and
/// only ever cleared when a new session starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationHistory {
    samples: Vec<Position>,
}

impl LocationHistory {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn push(&mut self, sample: Position) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Position> {
        self.samples.last()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn positions(&self) -> &[Position] {
        &self.samples
    }

    /// Iterator over the chronologically consecutive sample pairs.
    pub fn legs(&self) -> impl Iterator<Item = (&Position, &Position)> {
        self.samples.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}
