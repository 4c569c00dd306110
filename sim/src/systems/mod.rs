//! Gameplay systems run once per tick, after activation.
//!
//! Run order (chained):
//! - `activation_system` - rebuild hot/warm chunk sets
//! - `extraction_system` - extractors fill their output slots
//! - `portal_system` - resolve queued transit requests
//! - `transit_apply_system` - relocate entities that transited this tick

pub mod extraction;
pub mod inventory;
pub mod portal;

pub use extraction::*;
pub use inventory::*;
pub use portal::*;
