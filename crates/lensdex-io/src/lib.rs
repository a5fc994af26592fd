#![forbid(unsafe_code)]
//! lensdex-io: forward-only readers over delimited dataset files and the
//! index store adapters the bulk writers talk to.
//!
//! - `lines`: primary-file line reader with byte accounting.
//! - `cursor`: `SortedFileCursor`, one-record lookahead over a key-sorted file.
//! - `join`: `MultiFileJoinReader`, one cursor per auxiliary relation.
//! - `side`: small id → name lookup tables loaded up front.
//! - `store`: the `IndexStore` contract plus http/file/memory backends.

pub mod cursor;
pub mod error;
pub mod join;
pub mod lines;
pub mod side;
pub mod store;

pub use cursor::{JoinResult, SortedFileCursor};
pub use error::{Error, Result};
pub use join::{JoinedRecords, MultiFileJoinReader};
pub use lines::{Line, LineReader};
pub use side::{load_side_map, SideMap};
pub use store::{build_store, IndexStore};
