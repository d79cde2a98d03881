//! Differentiable RoI Align.
//!
//! [`RoiAlign`] normalizes pixel-space boxes with `roialign_core` and crops
//! fixed-size patches through a [`CropAndResize`] sampler. The bundled
//! [`BilinearCropAndResize`] is written with Burn tensor ops, so running it
//! on an autodiff backend yields gradients with respect to the feature map.

pub mod crop_and_resize;
pub mod roi_align;

pub use crop_and_resize::{BilinearCropAndResize, CropAndResize};
pub use roi_align::{RoiAlign, RoiAlignConfig};
