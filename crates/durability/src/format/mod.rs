//! On-disk byte formats of blocked tick files.
//!
//! # File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐  offset 0
//! │ File header, padded to block size  │
//! ├────────────────────────────────────┤  block_size
//! │ Tick block 1                       │
//! ├────────────────────────────────────┤  2 * block_size
//! │ Tick block 2                       │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! - `file_header`: the header block
//! - `block_header`: the header of each tick block

pub mod block_header;
pub mod file_header;

pub use block_header::{BlockHeader, BLOCK_HEADER_SIZE, BLOCK_HEADER_VERSION, TICK_BLOCK_TYPE};
pub use file_header::{
    FileHeader, DEFAULT_BLOCK_SIZE, FILE_HEADER_SIZE, FILE_HEADER_TYPE, FILE_HEADER_VERSION,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
