//! Box types and coordinate normalization for RoI Align.
//!
//! Boxes arrive in source-pixel coordinates and leave in the normalized
//! convention used by the crop-and-resize sampler, where a coordinate `t`
//! addresses pixel `t * (extent - 1)`. See [`normalize`] for the two
//! supported policies.

pub mod boxes;
pub mod error;
pub mod normalize;
pub mod observer;
pub mod validation;

pub use boxes::RoiBox;
pub use error::{Axis, Result, RoiAlignError};
pub use normalize::{
    normalize_boxes, normalize_boxes_tensor, normalize_boxes_with, normalize_boxes_xy,
    normalize_boxes_xy_tensor, normalize_extent, normalize_row_boxes_tensor,
};
pub use observer::{BoxObserver, HistoryObserver, NoopObserver, TracingObserver};
pub use validation::{ValidationConfig, ValidationInput};
