//! Scan cursor — where the scanner is and where it is heading.

use serde::{Deserialize, Serialize};

/// The scanner's position relative to the chain head.
///
/// `current` is the height of the next block to fetch and never moves
/// backwards. `target` is the last known head height and is inclusive:
/// the head block itself gets scanned. `hysteresis` is the dead band around
/// the head used to decide between scanning and idling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Height of the next block to fetch.
    pub current: u64,
    /// Highest known chain head height.
    pub target: u64,
    /// Width of the band around `target`, in blocks.
    pub hysteresis: u64,
}

impl ScanCursor {
    /// Create a cursor at `current` heading for `target`.
    pub fn new(current: u64, target: u64, hysteresis: u64) -> Self {
        Self {
            current,
            target,
            hysteresis,
        }
    }

    /// Signed distance from the cursor to the head (`target - current`).
    ///
    /// Negative once the cursor has moved past the head.
    pub fn distance(&self) -> i128 {
        i128::from(self.target) - i128::from(self.current)
    }

    /// Returns `true` while there is at least one block left to fetch.
    pub fn has_pending(&self) -> bool {
        self.current <= self.target
    }

    /// Returns `true` once the cursor has moved past the known head.
    pub fn passed_target(&self) -> bool {
        self.current > self.target
    }

    /// Move to the next block after a header was emitted.
    pub fn advance(&mut self) {
        self.current = self.current.saturating_add(1);
    }

    /// Jump forward to an externally observed block.
    ///
    /// Returns `true` if the cursor moved; lower or equal heights are ignored.
    pub fn fast_forward(&mut self, observed: u64) -> bool {
        if observed > self.current {
            self.current = observed;
            true
        } else {
            false
        }
    }

    /// Head is less than `hysteresis` blocks ahead (or already behind us).
    pub fn within_band(&self) -> bool {
        self.distance() < i128::from(self.hysteresis)
    }

    /// Head has drifted more than `hysteresis` blocks ahead.
    pub fn lost_head(&self) -> bool {
        self.distance() > i128::from(self.hysteresis)
    }
}
