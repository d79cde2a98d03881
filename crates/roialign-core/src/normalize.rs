//! Coordinate normalization for RoI Align.
//!
//! Maps pixel-space box extents onto the convention the crop-and-resize
//! sampler expects: a coordinate `t` addresses pixel `t * (extent - 1)`.
//!
//! Two policies are supported:
//!
//! * **fpcoor** (`transform_fpcoor = true`): the box is divided into `crop`
//!   equal cells and samples land on cell centers, with the half-pixel shift
//!   between the cell convention and the pixel-center convention removed.
//!   With `spacing = (hi - lo) / crop`:
//!   `start = (lo + spacing / 2 - 0.5) / (extent - 1)` and
//!   `end = start + spacing * (crop - 1) / (extent - 1)`.
//! * **legacy** (`transform_fpcoor = false`): plain rescale by `extent - 1`.
//!
//! Nothing is validated. `extent == 1` (or `crop == 1` in fpcoor mode)
//! divides by zero and the result carries infinities or NaN. Use
//! [`crate::validation`] for checked input.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::boxes::RoiBox;
use crate::observer::{BoxObserver, NoopObserver};

/// Normalize one extent `[lo, hi]` of an axis with `extent` pixels.
pub fn normalize_extent(
    lo: f64,
    hi: f64,
    extent: usize,
    crop: usize,
    transform_fpcoor: bool,
) -> (f64, f64) {
    let denom = extent as f64 - 1.0;
    if transform_fpcoor {
        let spacing = (hi - lo) / crop as f64;
        let start = (lo + spacing / 2.0 - 0.5) / denom;
        let span = spacing * (crop as f64 - 1.0) / denom;
        (start, start + span)
    } else {
        (lo / denom, hi / denom)
    }
}

/// Normalize the x extents of `boxes`; y extents are passed through.
pub fn normalize_boxes(
    boxes: &[RoiBox],
    image_width: usize,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Vec<RoiBox> {
    normalize_boxes_with(boxes, image_width, crop_width, transform_fpcoor, &NoopObserver)
}

/// [`normalize_boxes`], reporting the result to `observer`.
pub fn normalize_boxes_with(
    boxes: &[RoiBox],
    image_width: usize,
    crop_width: usize,
    transform_fpcoor: bool,
    observer: &dyn BoxObserver,
) -> Vec<RoiBox> {
    let out: Vec<RoiBox> = boxes
        .iter()
        .map(|b| {
            let (x1, x2) = normalize_extent(b.x1, b.x2, image_width, crop_width, transform_fpcoor);
            RoiBox::new(x1, b.y1, x2, b.y2)
        })
        .collect();
    observer.on_normalized(&out);
    out
}

/// Normalize both axes of `boxes`, using `crop_width` as the crop size of
/// each axis.
pub fn normalize_boxes_xy(
    boxes: &[RoiBox],
    image_width: usize,
    image_height: usize,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Vec<RoiBox> {
    boxes
        .iter()
        .map(|b| {
            let (x1, x2) = normalize_extent(b.x1, b.x2, image_width, crop_width, transform_fpcoor);
            let (y1, y2) = normalize_extent(b.y1, b.y2, image_height, crop_width, transform_fpcoor);
            RoiBox::new(x1, y1, x2, y2)
        })
        .collect()
}

/// Tensor form of [`normalize_extent`] over `[M, 1]` columns.
pub fn normalize_extent_tensor<B: Backend>(
    lo: Tensor<B, 2>,
    hi: Tensor<B, 2>,
    extent: usize,
    crop: usize,
    transform_fpcoor: bool,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let denom = extent as f64 - 1.0;
    if transform_fpcoor {
        let spacing = (hi - lo.clone()).div_scalar(crop as f64);
        let start = (lo + spacing.clone().div_scalar(2.0))
            .sub_scalar(0.5)
            .div_scalar(denom);
        let span = spacing.mul_scalar(crop as f64 - 1.0).div_scalar(denom);
        (start.clone(), start + span)
    } else {
        (lo.div_scalar(denom), hi.div_scalar(denom))
    }
}

/// Tensor form of [`normalize_boxes`] over `[M, 4]` boxes.
///
/// The input is detached first: the result is a constant with respect to
/// the autodiff graph.
pub fn normalize_boxes_tensor<B: Backend>(
    boxes: Tensor<B, 2>,
    image_width: usize,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Tensor<B, 2> {
    let boxes = boxes.detach();
    let x1 = boxes.clone().narrow(1, 0, 1);
    let y1 = boxes.clone().narrow(1, 1, 1);
    let x2 = boxes.clone().narrow(1, 2, 1);
    let y2 = boxes.narrow(1, 3, 1);

    let (x1, x2) = normalize_extent_tensor(x1, x2, image_width, crop_width, transform_fpcoor);
    Tensor::cat(vec![x1, y1, x2, y2], 1)
}

/// Tensor form of [`normalize_boxes_xy`] over `[M, 4]` boxes.
pub fn normalize_boxes_xy_tensor<B: Backend>(
    boxes: Tensor<B, 2>,
    image_width: usize,
    image_height: usize,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Tensor<B, 2> {
    let boxes = boxes.detach();
    let x1 = boxes.clone().narrow(1, 0, 1);
    let y1 = boxes.clone().narrow(1, 1, 1);
    let x2 = boxes.clone().narrow(1, 2, 1);
    let y2 = boxes.narrow(1, 3, 1);

    let (x1, x2) = normalize_extent_tensor(x1, x2, image_width, crop_width, transform_fpcoor);
    let (y1, y2) = normalize_extent_tensor(y1, y2, image_height, crop_width, transform_fpcoor);
    Tensor::cat(vec![x1, y1, x2, y2], 1)
}

/// Tensor form of the x-only normalization over `[M, 2]` row boxes
/// `(x1, x2)`.
pub fn normalize_row_boxes_tensor<B: Backend>(
    boxes: Tensor<B, 2>,
    image_width: usize,
    crop_width: usize,
    transform_fpcoor: bool,
) -> Tensor<B, 2> {
    let boxes = boxes.detach();
    let x1 = boxes.clone().narrow(1, 0, 1);
    let x2 = boxes.narrow(1, 1, 1);

    let (x1, x2) = normalize_extent_tensor(x1, x2, image_width, crop_width, transform_fpcoor);
    Tensor::cat(vec![x1, x2], 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::HistoryObserver;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_fpcoor_reference_box() {
        // W = 224, crop = 7, x in [32, 96]
        let out = normalize_boxes(&[RoiBox::from_x(32.0, 96.0)], 224, 7, true);
        let spacing = 64.0 / 7.0;
        let start = (32.0 + spacing / 2.0 - 0.5) / 223.0;
        let end = start + spacing * 6.0 / 223.0;

        assert!((out[0].x1 - start).abs() < EPS);
        assert!((out[0].x2 - end).abs() < EPS);
        assert!((out[0].x1 - 0.161755).abs() < 1e-6);
        assert!((out[0].x2 - 0.407751).abs() < 1e-6);
    }

    #[test]
    fn test_legacy_rescale_bounds() {
        let out = normalize_boxes(&[RoiBox::from_x(0.0, 223.0)], 224, 7, false);
        assert_eq!(out[0].x1, 0.0);
        assert!((out[0].x2 - 1.0).abs() < EPS);
    }

    #[test]
    fn test_y_passes_through() {
        let b = RoiBox::new(4.0, -3.5, 12.0, 99.0);
        for fpcoor in [true, false] {
            let out = normalize_boxes(&[b], 32, 4, fpcoor);
            assert_eq!(out[0].y1, -3.5);
            assert_eq!(out[0].y2, 99.0);
        }
    }

    #[test]
    fn test_point_box_degenerates_to_point() {
        let out = normalize_boxes(&[RoiBox::from_x(5.0, 5.0)], 11, 3, true);
        assert!((out[0].x1 - 0.45).abs() < EPS);
        assert_eq!(out[0].x1, out[0].x2);
    }

    #[test]
    fn test_inverted_box_is_not_rejected() {
        let out = normalize_boxes(&[RoiBox::from_x(10.0, 2.0)], 11, 4, true);
        assert!(out[0].x2 < out[0].x1);
    }

    #[test]
    fn test_unit_width_divides_by_zero() {
        let out = normalize_boxes(&[RoiBox::from_x(0.0, 3.0)], 1, 4, false);
        assert!(out[0].x1.is_nan());
        assert_eq!(out[0].x2, f64::INFINITY);

        let out = normalize_boxes(&[RoiBox::from_x(0.0, 3.0)], 1, 4, true);
        assert!(!out[0].x1.is_finite());
        assert!(!out[0].x2.is_finite());
    }

    #[test]
    fn test_unit_crop_in_fpcoor_mode() {
        // crop = 1 puts the single sample at the box center
        let out = normalize_boxes(&[RoiBox::from_x(2.0, 6.0)], 11, 1, true);
        assert!((out[0].x1 - 0.35).abs() < EPS);
        assert_eq!(out[0].x1, out[0].x2);
    }

    #[test]
    fn test_xy_normalizes_height() {
        let out = normalize_boxes_xy(&[RoiBox::new(0.0, 0.0, 15.0, 7.0)], 16, 8, 4, false);
        assert!((out[0].x2 - 1.0).abs() < EPS);
        assert!((out[0].y2 - 1.0).abs() < EPS);
    }

    #[test]
    fn test_observer_sees_output() {
        let observer = HistoryObserver::new();
        let out = normalize_boxes_with(&[RoiBox::from_x(1.0, 9.0)], 11, 4, true, &observer);
        assert_eq!(observer.last(), Some(out));
    }

    #[test]
    fn test_tensor_matches_scalar() {
        let device = Default::default();
        let boxes = vec![
            RoiBox::new(32.0, 10.0, 96.0, 50.0),
            RoiBox::new(-4.0, 0.0, 250.0, 3.0),
            RoiBox::new(7.0, 7.0, 7.0, 7.0),
        ];
        for fpcoor in [true, false] {
            let expected = normalize_boxes(&boxes, 224, 7, fpcoor);
            let tensor = Tensor::<TestBackend, 2>::from_floats(
                [
                    [32.0, 10.0, 96.0, 50.0],
                    [-4.0, 0.0, 250.0, 3.0],
                    [7.0, 7.0, 7.0, 7.0],
                ],
                &device,
            );
            let result = normalize_boxes_tensor(tensor, 224, 7, fpcoor);
            assert_eq!(result.dims(), [3, 4]);
            let data = result.into_data();
            let slice = data.as_slice::<f32>().unwrap();

            for (i, b) in expected.iter().enumerate() {
                for (j, v) in b.to_array().iter().enumerate() {
                    let got = slice[i * 4 + j] as f64;
                    assert!((got - v).abs() < 1e-5, "box {} col {}: {} vs {}", i, j, got, v);
                }
            }
        }
    }

    #[test]
    fn test_row_tensor() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2>::from_floats([[0.0, 10.0]], &device);
        let result = normalize_row_boxes_tensor(tensor, 11, 4, false);
        assert_eq!(result.dims(), [1, 2]);
        let data = result.into_data();
        let slice = data.as_slice::<f32>().unwrap();
        assert_eq!(slice[0], 0.0);
        assert!((slice[1] - 1.0).abs() < 1e-6);
    }
}
