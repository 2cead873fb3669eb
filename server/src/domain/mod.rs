//! Searchable entities and saved searches
//!
//! - `transformer` - The search pipeline shared by every entity
//! - `contacts`, `callouts`, `responses`, `payments` - Entity transformers
//! - `segments` - Saved contact searches

pub mod callouts;
pub mod contacts;
pub mod payments;
pub mod responses;
pub mod segments;
pub mod transformer;

#[cfg(test)]
pub(crate) mod fixtures;

pub use callouts::{CalloutFieldResolver, CalloutTransformer};
pub use contacts::ContactTransformer;
pub use payments::PaymentTransformer;
pub use responses::ResponseTransformer;
pub use segments::{NewSegment, Segment, SegmentError, SegmentPatch, SegmentService};
pub use transformer::Transformer;
