//! Block store
//!
//! - `tick_block`: one block being filled or read
//! - `file`: the blocked tick file built from those blocks

mod file;
mod tick_block;

pub use file::{scan_blocks, BlockSummary, BlockTickFile};
pub use tick_block::TickBlock;
