//! Decides which raster payloads a write must (re)produce

use crate::core::product::{Band, TiePointGrid};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Write-relevant state of one raster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWriteState {
    pub modified: bool,
    pub sidecar_exists: bool,
    pub synthetic: bool,
    pub is_virtual: bool,
    pub is_filter: bool,
}

impl NodeWriteState {
    pub fn of_band(band: &Band, sidecar: &Path) -> Self {
        Self {
            modified: band.modified,
            sidecar_exists: sidecar.is_file(),
            synthetic: band.synthetic,
            is_virtual: band.is_virtual(),
            is_filter: band.is_filter(),
        }
    }

    pub fn of_tie_point_grid(grid: &TiePointGrid, sidecar: &Path) -> Self {
        Self {
            modified: grid.modified,
            sidecar_exists: sidecar.is_file(),
            synthetic: false,
            is_virtual: false,
            is_filter: false,
        }
    }

    /// Computed nodes never have a payload of their own
    pub fn is_computed(&self) -> bool {
        self.synthetic || self.is_virtual || self.is_filter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncrementalWritePlanner {
    pub incremental: bool,
}

impl IncrementalWritePlanner {
    pub fn new(incremental: bool) -> Self {
        Self { incremental }
    }

    /// Whether the node's payload must be written. An unmodified node whose
    /// sidecar is already on disk is skipped in incremental mode.
    pub fn should_write(&self, state: &NodeWriteState) -> bool {
        if state.is_computed() {
            return false;
        }
        let up_to_date = self.incremental && !state.modified && state.sidecar_exists;
        !up_to_date
    }

    /// Tie-point grids are small and rewritten on every write
    pub fn always_rewrite_tie_point_grids(&self) -> bool {
        true
    }
}
