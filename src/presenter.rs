//! # Result Presenter
//!
//! Holds the one reading set on screen. A successful analysis replaces it;
//! failures never touch it. What happens at the start of a new capture is a
//! policy choice:
//!
//! - [`StalePolicy::KeepVisible`] (default): the previous readings stay up
//!   until a new set replaces them.
//! - [`StalePolicy::HideWhileAnalyzing`]: the readings are cleared when the
//!   shutter fires, so nothing stale is shown next to a busy indicator.

use std::fmt::Write as _;

use crate::analysis::ReadingSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    #[default]
    KeepVisible,
    HideWhileAnalyzing,
}

#[derive(Debug, Default)]
pub struct ResultPresenter {
    current: Option<ReadingSet>,
    policy: StalePolicy,
}

impl ResultPresenter {
    pub fn new(policy: StalePolicy) -> Self {
        Self {
            current: None,
            policy,
        }
    }

    pub fn policy(&self) -> StalePolicy {
        self.policy
    }

    /// Replace whatever is displayed.
    pub fn show(&mut self, readings: ReadingSet) {
        self.current = Some(readings);
    }

    /// Called when the shutter fires.
    pub fn clear_on_capture_start(&mut self) {
        if self.policy == StalePolicy::HideWhileAnalyzing {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&ReadingSet> {
        self.current.as_ref()
    }

    /// The results panel, or `None` when nothing is displayed.
    pub fn render(&self) -> Option<String> {
        let readings = self.current.as_ref()?;
        let mut out = String::from("Analysis Results:\n");
        for reading in readings.entries() {
            let unit = reading.unit.map(|u| format!(" {}", u)).unwrap_or_default();
            let _ = writeln!(out, "{}: {}{}", reading.label, reading.value, unit);
        }
        Some(out)
    }
}
