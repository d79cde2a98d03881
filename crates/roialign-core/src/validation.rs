//! Opt-in input validation for RoI Align.
//!
//! The default path accepts anything and lets NaN or infinity flow through.
//! These checks reject the inputs that would otherwise be silently corrupted:
//! inverted or non-finite boxes, batch indices outside the feature map,
//! mismatched cardinalities, and extents that zero a denominator.

use crate::boxes::RoiBox;
use crate::error::{Axis, Result, RoiAlignError};

/// Validation configuration.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Reject boxes with `x1 > x2` or `y1 > y2`.
    pub check_ordering: bool,
    /// Reject boxes containing NaN or infinity.
    pub check_finite: bool,
    /// Reject batch indices outside `[0, batch_size)`.
    pub check_index_bounds: bool,
    /// Reject extents that make a normalization denominator zero.
    pub check_extents: bool,
    /// Also check the y extent of each box.
    pub check_y: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_ordering: true,
            check_finite: true,
            check_index_bounds: true,
            check_extents: true,
            check_y: true,
        }
    }
}

impl ValidationConfig {
    /// Create a new validation config with every check enabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_ordering(mut self) -> Self {
        self.check_ordering = false;
        self
    }

    pub fn without_finite_check(mut self) -> Self {
        self.check_finite = false;
        self
    }

    pub fn without_index_bounds(mut self) -> Self {
        self.check_index_bounds = false;
        self
    }

    pub fn without_extent_check(mut self) -> Self {
        self.check_extents = false;
        self
    }

    /// Only check the x extent, for row boxes or y pass-through.
    pub fn x_only(mut self) -> Self {
        self.check_y = false;
        self
    }
}

/// Validate box coordinates.
pub fn validate_boxes(boxes: &[RoiBox], config: &ValidationConfig) -> Result<()> {
    for (index, b) in boxes.iter().enumerate() {
        if config.check_finite {
            let finite = if config.check_y {
                b.is_finite()
            } else {
                b.x1.is_finite() && b.x2.is_finite()
            };
            if !finite {
                return Err(RoiAlignError::NonFiniteBox { index });
            }
        }

        if config.check_ordering {
            if b.x1 > b.x2 {
                return Err(RoiAlignError::InvertedBox {
                    index,
                    axis: Axis::X,
                    lo: b.x1,
                    hi: b.x2,
                });
            }
            if config.check_y && b.y1 > b.y2 {
                return Err(RoiAlignError::InvertedBox {
                    index,
                    axis: Axis::Y,
                    lo: b.y1,
                    hi: b.y2,
                });
            }
        }
    }

    Ok(())
}

/// Validate that every batch index lies in `[0, batch_size)`.
pub fn validate_box_indices(box_index: &[i64], batch_size: usize) -> Result<()> {
    for (index, &value) in box_index.iter().enumerate() {
        if value < 0 || value as u64 >= batch_size as u64 {
            return Err(RoiAlignError::BoxIndexOutOfRange {
                index,
                value,
                batch_size,
            });
        }
    }

    Ok(())
}

/// Validate that boxes and batch indices pair up one to one.
pub fn validate_cardinality(num_boxes: usize, num_indices: usize) -> Result<()> {
    if num_boxes != num_indices {
        return Err(RoiAlignError::CardinalityMismatch {
            boxes: num_boxes,
            indices: num_indices,
        });
    }

    Ok(())
}

/// Validate the extents that appear as denominators during normalization.
///
/// `image_height` is `None` when the y axis is not normalized.
pub fn validate_extents(
    image_width: usize,
    image_height: Option<usize>,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Result<()> {
    if crop_width == 0 {
        return Err(RoiAlignError::DegenerateExtent {
            name: "crop_width",
            value: crop_width,
            minimum: 1,
        });
    }

    if image_width < 2 {
        return Err(RoiAlignError::DegenerateExtent {
            name: "image_width",
            value: image_width,
            minimum: 2,
        });
    }

    if let Some(h) = image_height {
        if h < 2 {
            return Err(RoiAlignError::DegenerateExtent {
                name: "image_height",
                value: h,
                minimum: 2,
            });
        }
    }

    if transform_fpcoor && crop_width < 2 {
        return Err(RoiAlignError::DegenerateExtent {
            name: "crop_width",
            value: crop_width,
            minimum: 2,
        });
    }

    Ok(())
}

/// Inputs to a complete validation pass.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub boxes: &'a [RoiBox],
    pub box_index: &'a [i64],
    pub batch_size: usize,
    pub image_width: usize,
    pub image_height: Option<usize>,
    pub crop_width: usize,
    pub transform_fpcoor: bool,
}

/// Run every enabled check, stopping at the first violation.
pub fn validate_all(input: &ValidationInput<'_>, config: &ValidationConfig) -> Result<()> {
    validate_cardinality(input.boxes.len(), input.box_index.len())?;

    if config.check_extents {
        validate_extents(
            input.image_width,
            input.image_height,
            input.crop_width,
            input.transform_fpcoor,
        )?;
    }

    if config.check_index_bounds {
        validate_box_indices(input.box_index, input.batch_size)?;
    }

    validate_boxes(input.boxes, config)
}
