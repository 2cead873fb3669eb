//! SQLite repositories
//!
//! Types (SegmentRow, etc.) should be imported from `crate::data::types`.

pub mod callout;
pub mod segment;

pub use callout::get_callout_form;
pub use segment::{create_segment, delete_segment, get_segment, list_segments, update_segment};
