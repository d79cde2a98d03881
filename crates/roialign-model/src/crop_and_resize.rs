//! Differentiable crop-and-resize sampling.
//!
//! Boxes are expected in normalized coordinates: along an axis with `E`
//! pixels, a coordinate `t` addresses pixel `t * (E - 1)`. For an output of
//! `K` samples the `k`-th sample lands at
//!
//! * `lo * (E - 1) + k * (hi - lo) * (E - 1) / (K - 1)` when `K > 1`,
//! * `(lo + hi) / 2 * (E - 1)` when `K == 1`.
//!
//! Values are bilinearly interpolated from the clamped neighbours. Samples
//! outside `[0, E - 1]` on any axis take the extrapolation value.
//!
//! The sampler is composed from `select` and `gather`, so an autodiff
//! backend derives the gradient with respect to the image. Boxes and batch
//! indices are treated as constants. Batch indices are not range-checked.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

/// Crop-and-resize sampling primitive.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait CropAndResize<B: Backend> {
    /// Sample one `crop_size = [height, width]` patch per box.
    ///
    /// # Arguments
    /// * `image` - Feature map `[N, C, H, W]`
    /// * `boxes` - Normalized boxes `[M, 4]` as `(x1, y1, x2, y2)`
    /// * `box_index` - Batch slice of `image` for each box `[M]`
    ///
    /// # Returns
    /// Tensor of shape `[M, C, height, width]`
    fn crop_and_resize(
        &self,
        image: Tensor<B, 4>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
        crop_size: [usize; 2],
        extrapolation_value: f64,
    ) -> Tensor<B, 4>;

    /// Sample one `crop_width` segment per box from row features.
    ///
    /// # Arguments
    /// * `rows` - Row features `[N, C, W]`
    /// * `boxes` - Normalized extents `[M, 2]` as `(x1, x2)`
    /// * `box_index` - Batch slice of `rows` for each box `[M]`
    ///
    /// # Returns
    /// Tensor of shape `[M, C, crop_width]`
    fn crop_and_resize_rows(
        &self,
        rows: Tensor<B, 3>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
        crop_width: usize,
        extrapolation_value: f64,
    ) -> Tensor<B, 3>;
}

/// Bilinear crop-and-resize.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BilinearCropAndResize;

impl BilinearCropAndResize {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> CropAndResize<B> for BilinearCropAndResize {
    fn crop_and_resize(
        &self,
        image: Tensor<B, 4>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
        crop_size: [usize; 2],
        extrapolation_value: f64,
    ) -> Tensor<B, 4> {
        let [_, c, h, w] = image.dims();
        let [crop_h, crop_w] = crop_size;
        let m = boxes.dims()[0];
        let device = image.device();

        if m == 0 || crop_h == 0 || crop_w == 0 {
            return Tensor::zeros([m, c, crop_h, crop_w], &device);
        }

        let boxes = boxes.detach();
        let x1 = boxes.clone().narrow(1, 0, 1);
        let y1 = boxes.clone().narrow(1, 1, 1);
        let x2 = boxes.clone().narrow(1, 2, 1);
        let y2 = boxes.narrow(1, 3, 1);

        // [M, crop_h, crop_w] sample positions in pixels
        let in_y = sample_positions(y1, y2, h, crop_h, &device)
            .reshape([m, crop_h, 1])
            .repeat(&[1, 1, crop_w]);
        let in_x = sample_positions(x1, x2, w, crop_w, &device)
            .reshape([m, 1, crop_w])
            .repeat(&[1, crop_h, 1]);

        let y0 = in_y.clone().floor();
        let x0 = in_x.clone().floor();
        let wy = in_y.clone() - y0.clone();
        let wx = in_x.clone() - x0.clone();

        let (y0_i, y1_i) = neighbour_indices(y0, h);
        let (x0_i, x1_i) = neighbour_indices(x0, w);

        // One slice of the feature map per box: [M, C, H*W]
        let flat = image.select(0, box_index).reshape([m, c, h * w]);

        let stride_y = w as i32;
        let y0_off = y0_i.mul_scalar(stride_y);
        let y1_off = y1_i.mul_scalar(stride_y);

        let gather = |idx: Tensor<B, 3, Int>| -> Tensor<B, 4> {
            let idx = idx.reshape([m, 1, crop_h * crop_w]).repeat(&[1, c, 1]);
            flat.clone().gather(2, idx).reshape([m, c, crop_h, crop_w])
        };

        let top_left = gather(y0_off.clone() + x0_i.clone());
        let top_right = gather(y0_off + x1_i.clone());
        let bottom_left = gather(y1_off.clone() + x0_i);
        let bottom_right = gather(y1_off + x1_i);

        let per_channel = |t: Tensor<B, 3>| -> Tensor<B, 4> {
            t.reshape([m, 1, crop_h, crop_w]).repeat(&[1, c, 1, 1])
        };
        let wx = per_channel(wx);
        let wy = per_channel(wy);

        let top = top_left.clone() + (top_right - top_left) * wx.clone();
        let bottom = bottom_left.clone() + (bottom_right - bottom_left) * wx;
        let values = top.clone() + (bottom - top) * wy;

        let outside = per_channel(outside_mask(in_x, w) + outside_mask(in_y, h));
        fill_outside(values, outside, extrapolation_value)
    }

    fn crop_and_resize_rows(
        &self,
        rows: Tensor<B, 3>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
        crop_width: usize,
        extrapolation_value: f64,
    ) -> Tensor<B, 3> {
        let [_, c, w] = rows.dims();
        let m = boxes.dims()[0];
        let device = rows.device();

        if m == 0 || crop_width == 0 {
            return Tensor::zeros([m, c, crop_width], &device);
        }

        let boxes = boxes.detach();
        let x1 = boxes.clone().narrow(1, 0, 1);
        let x2 = boxes.narrow(1, 1, 1);

        // [M, crop_width]
        let in_x = sample_positions(x1, x2, w, crop_width, &device);
        let x0 = in_x.clone().floor();
        let wx = in_x.clone() - x0.clone();
        let (x0_i, x1_i) = neighbour_indices(x0, w);

        let selected = rows.select(0, box_index);
        let gather = |idx: Tensor<B, 2, Int>| -> Tensor<B, 3> {
            let idx = idx.reshape([m, 1, crop_width]).repeat(&[1, c, 1]);
            selected.clone().gather(2, idx)
        };

        let left = gather(x0_i);
        let right = gather(x1_i);

        let per_channel = |t: Tensor<B, 2>| -> Tensor<B, 3> {
            t.reshape([m, 1, crop_width]).repeat(&[1, c, 1])
        };

        let values = left.clone() + (right - left) * per_channel(wx);
        let outside = per_channel(outside_mask(in_x, w));
        fill_outside(values, outside, extrapolation_value)
    }
}

/// Pixel positions of `crop` samples between normalized `lo` and `hi`.
///
/// `lo` and `hi` are `[M, 1]`; the result is `[M, crop]`.
fn sample_positions<B: Backend>(
    lo: Tensor<B, 2>,
    hi: Tensor<B, 2>,
    extent: usize,
    crop: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let m = lo.dims()[0];
    let scale = extent as f64 - 1.0;

    if crop > 1 {
        // Blend the end points so the last sample lands on `hi` exactly
        let t = Tensor::<B, 1, Int>::arange(0..crop as i64, device)
            .float()
            .div_scalar((crop - 1) as f64)
            .reshape([1, crop])
            .repeat(&[m, 1]);
        let start = lo.mul_scalar(scale).repeat(&[1, crop]);
        let end = hi.mul_scalar(scale).repeat(&[1, crop]);
        start * t.clone().neg().add_scalar(1.0) + end * t
    } else {
        (lo + hi).mul_scalar(0.5 * scale)
    }
}

/// Clamped indices of the two pixels bracketing each floored position.
///
/// NaN positions read pixel 0; their weights stay NaN, so the sample does
/// too.
fn neighbour_indices<B: Backend, const D: usize>(
    floor: Tensor<B, D>,
    extent: usize,
) -> (Tensor<B, D, Int>, Tensor<B, D, Int>) {
    let nan = floor.clone().not_equal(floor.clone());
    let floor = floor.mask_fill(nan, 0.0);
    let max = extent.saturating_sub(1) as f32;

    let lower = floor.clone().clamp(0.0, max).int();
    let upper = floor.add_scalar(1.0).clamp(0.0, max).int();
    (lower, upper)
}

/// 1.0 where a position lies outside `[0, extent - 1]`, else 0.0.
fn outside_mask<B: Backend, const D: usize>(pos: Tensor<B, D>, extent: usize) -> Tensor<B, D> {
    let below = pos.clone().lower_elem(0.0).float();
    let above = pos.greater_elem(extent.saturating_sub(1) as f32).float();
    below + above
}

fn fill_outside<B: Backend, const D: usize>(
    values: Tensor<B, D>,
    outside: Tensor<B, D>,
    extrapolation_value: f64,
) -> Tensor<B, D> {
    values.mask_fill(outside.greater_elem(0.0), extrapolation_value)
}
