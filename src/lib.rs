// Block-matching point tracker for video annotation.
//
// A track starts from a user-placed seed point. For every following frame the
// block around the previous point is searched for inside a window of the new
// frame using normalized cross-correlation, the best candidate is weighted
// against a linear motion forecast, and the reference block is refreshed
// according to a configurable update strategy.

mod all;

pub mod block_tracker;
pub mod correlation;
pub mod error;
pub mod forecast;
pub mod image;
pub mod parameters;
pub mod record;
pub mod synthetic;
pub mod template_update;
pub mod track;
pub mod track_point;
pub mod types;
pub mod visualize;

pub use crate::all::*;
