//! Step-by-step observation log of the expansion search.
//!
//! Only compiled with the `replay` feature. Recording never influences the
//! simulation; it lets tooling watch the search unfold.

use serde::{Deserialize, Serialize};
use township_core::Volume;

const DEFAULT_MAX_DEPTH: u8 = 2;

/// One recorded observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayEvent {
    /// A labelled stage of the search.
    Step {
        /// Nesting depth of the stage; zero is a whole request.
        depth: u8,
        /// Human readable description.
        label: String,
    },
    /// A region the search is looking at.
    Highlight {
        /// Nesting depth of the stage that produced it.
        depth: u8,
        /// Region being highlighted.
        region: Volume,
    },
}

/// Ordered observations, filtered by depth.
#[derive(Clone, Debug)]
pub struct ReplayLog {
    max_depth: u8,
    events: Vec<ReplayEvent>,
}

impl Default for ReplayLog {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            events: Vec::new(),
        }
    }
}

impl ReplayLog {
    /// Records a stage; `label` is only built when the depth is kept.
    pub fn step(&mut self, depth: u8, label: impl FnOnce() -> String) {
        if depth <= self.max_depth {
            self.events.push(ReplayEvent::Step {
                depth,
                label: label(),
            });
        }
    }

    /// Records a highlighted region.
    pub fn highlight(&mut self, depth: u8, region: Volume) {
        if depth <= self.max_depth {
            self.events.push(ReplayEvent::Highlight { depth, region });
        }
    }

    /// Limits recording to stages at or above `depth`.
    pub fn set_max_depth(&mut self, depth: u8) {
        self.max_depth = depth;
    }

    /// Observations recorded so far.
    #[must_use]
    pub fn events(&self) -> &[ReplayEvent] {
        &self.events
    }
}
