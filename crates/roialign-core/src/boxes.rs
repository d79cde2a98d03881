//! Region-of-interest boxes.
//!
//! A box is an axis-aligned rectangle `(x1, y1, x2, y2)`. Before
//! normalization the coordinates are in source pixels; afterwards they are
//! fractions of `extent - 1` along each axis. Ordering (`x1 <= x2`) is a
//! precondition, not an invariant: nothing in this module enforces it.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Shape, Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RoiAlignError};

/// Number of columns in a box tensor: `(x1, y1, x2, y2)`.
pub const BOX_COLUMNS: usize = 4;

/// Number of columns in a row-box tensor: `(x1, x2)`.
pub const ROW_BOX_COLUMNS: usize = 2;

/// Axis-aligned box `(x1, y1, x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoiBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl RoiBox {
    /// Create a new box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box that only carries a horizontal extent.
    pub fn from_x(x1: f64, x2: f64) -> Self {
        Self::new(x1, 0.0, x2, 0.0)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl From<[f64; 4]> for RoiBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// Read a `[M, 4]` box tensor back to the host.
pub fn boxes_from_tensor<B: Backend>(boxes: Tensor<B, 2>) -> Result<Vec<RoiBox>> {
    let [_, cols] = boxes.dims();
    if cols != BOX_COLUMNS {
        return Err(RoiAlignError::shape_mismatch(
            [boxes.dims()[0], BOX_COLUMNS],
            boxes.dims(),
        ));
    }

    let values = float_values(boxes)?;
    Ok(values
        .chunks_exact(BOX_COLUMNS)
        .map(|c| RoiBox::new(c[0], c[1], c[2], c[3]))
        .collect())
}

/// Read a `[M, 2]` row-box tensor `(x1, x2)` back to the host.
pub fn row_boxes_from_tensor<B: Backend>(boxes: Tensor<B, 2>) -> Result<Vec<RoiBox>> {
    let [_, cols] = boxes.dims();
    if cols != ROW_BOX_COLUMNS {
        return Err(RoiAlignError::shape_mismatch(
            [boxes.dims()[0], ROW_BOX_COLUMNS],
            boxes.dims(),
        ));
    }

    let values = float_values(boxes)?;
    Ok(values
        .chunks_exact(ROW_BOX_COLUMNS)
        .map(|c| RoiBox::from_x(c[0], c[1]))
        .collect())
}

/// Build a `[M, 4]` box tensor on `device`.
pub fn boxes_to_tensor<B: Backend>(boxes: &[RoiBox], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = boxes
        .iter()
        .flat_map(|b| b.to_array())
        .map(|v| v as f32)
        .collect();
    Tensor::from_data(
        TensorData::new(flat, Shape::new([boxes.len(), BOX_COLUMNS])),
        device,
    )
}

/// Build a `[M, 2]` row-box tensor `(x1, x2)` on `device`.
pub fn row_boxes_to_tensor<B: Backend>(boxes: &[RoiBox], device: &B::Device) -> Tensor<B, 2> {
    let flat: Vec<f32> = boxes
        .iter()
        .flat_map(|b| [b.x1 as f32, b.x2 as f32])
        .collect();
    Tensor::from_data(
        TensorData::new(flat, Shape::new([boxes.len(), ROW_BOX_COLUMNS])),
        device,
    )
}

/// Read a batch-index tensor back to the host.
pub fn box_indices_from_tensor<B: Backend>(box_index: Tensor<B, 1, Int>) -> Result<Vec<i64>> {
    box_index
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| RoiAlignError::data_conversion(format!("{:?}", e)))
}

fn float_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| RoiAlignError::data_conversion(format!("{:?}", e)))
}
