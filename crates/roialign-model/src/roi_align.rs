//! RoI Align operator.
//!
//! Rewrites pixel-space boxes into the sampler's normalized convention and
//! crops one `crop_width x crop_width` patch per box. Box coordinates are
//! detached before sampling: gradients reach the feature map only.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use serde::{Deserialize, Serialize};

use roialign_core::boxes::{box_indices_from_tensor, boxes_from_tensor, row_boxes_from_tensor};
use roialign_core::normalize::{
    normalize_boxes_tensor, normalize_boxes_xy_tensor, normalize_row_boxes_tensor,
};
use roialign_core::validation::{validate_all, ValidationConfig, ValidationInput};
use roialign_core::{BoxObserver, Result, RoiAlignError, RoiBox};

use crate::crop_and_resize::{BilinearCropAndResize, CropAndResize};

/// Configuration for [`RoiAlign`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiAlignConfig {
    /// Output grid size; crops are `crop_width x crop_width`.
    pub crop_width: usize,
    /// Fill value for samples outside the feature map.
    #[serde(default)]
    pub extrapolation_value: f64,
    /// Apply the sub-pixel fpcoor correction instead of a plain rescale.
    #[serde(default = "default_true")]
    pub transform_fpcoor: bool,
    /// Normalize y extents by the feature-map height, using the same formula
    /// as x. On by default, so `forward` rewrites y as well as x. Set it to
    /// false to hand y extents to the sampler unchanged.
    #[serde(default = "default_true")]
    pub normalize_y: bool,
}

fn default_true() -> bool {
    true
}

impl RoiAlignConfig {
    /// Create a config with the default extrapolation value (0) and fpcoor
    /// normalization.
    pub fn new(crop_width: usize) -> Self {
        Self {
            crop_width,
            extrapolation_value: 0.0,
            transform_fpcoor: true,
            normalize_y: true,
        }
    }

    pub fn with_extrapolation_value(mut self, value: f64) -> Self {
        self.extrapolation_value = value;
        self
    }

    pub fn with_transform_fpcoor(mut self, enabled: bool) -> Self {
        self.transform_fpcoor = enabled;
        self
    }

    pub fn with_normalize_y(mut self, enabled: bool) -> Self {
        self.normalize_y = enabled;
        self
    }

    /// Check the configuration on its own, independent of any input.
    pub fn validate(&self) -> Result<()> {
        if self.crop_width == 0 {
            return Err(RoiAlignError::invalid_configuration(
                "crop_width must be positive",
            ));
        }

        if !self.extrapolation_value.is_finite() {
            return Err(RoiAlignError::invalid_configuration(format!(
                "extrapolation_value must be finite, got {}",
                self.extrapolation_value
            )));
        }

        Ok(())
    }

    /// Build an operator using the bilinear sampler.
    pub fn init<B: Backend>(&self) -> RoiAlign<B, BilinearCropAndResize> {
        self.init_with_sampler(BilinearCropAndResize::new())
    }

    /// Build an operator around a custom sampler.
    pub fn init_with_sampler<B: Backend, S: CropAndResize<B>>(&self, sampler: S) -> RoiAlign<B, S> {
        RoiAlign {
            config: self.clone(),
            sampler,
            observer: None,
            validation: ValidationConfig::default(),
            _phantom: PhantomData,
        }
    }
}

/// RoI Align operator.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `S` - The crop-and-resize sampler
pub struct RoiAlign<B: Backend, S: CropAndResize<B> = BilinearCropAndResize> {
    config: RoiAlignConfig,
    sampler: S,
    observer: Option<Arc<dyn BoxObserver>>,
    validation: ValidationConfig,
    _phantom: PhantomData<B>,
}

impl<B: Backend, S: CropAndResize<B>> RoiAlign<B, S> {
    /// Report normalized boxes to `observer` on every call.
    ///
    /// Reporting reads the boxes back from the device.
    pub fn with_observer(mut self, observer: Arc<dyn BoxObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Checks used by [`RoiAlign::forward_checked`].
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    pub fn config(&self) -> &RoiAlignConfig {
        &self.config
    }

    /// Crop one patch per box.
    ///
    /// # Arguments
    /// * `feature_map` - `[N, C, H, W]`
    /// * `boxes` - `[M, 4]` pixel-space `(x1, y1, x2, y2)`
    /// * `box_index` - `[M]` batch index per box
    ///
    /// # Returns
    /// Tensor of shape `[M, C, crop_width, crop_width]`
    pub fn forward(
        &self,
        feature_map: Tensor<B, 4>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
    ) -> Tensor<B, 4> {
        let [_, _, h, w] = feature_map.dims();
        let crop = self.config.crop_width;

        let boxes = if self.config.normalize_y {
            normalize_boxes_xy_tensor(boxes, w, h, crop, self.config.transform_fpcoor)
        } else {
            normalize_boxes_tensor(boxes, w, crop, self.config.transform_fpcoor)
        };
        self.report(|| boxes_from_tensor(boxes.clone()));

        self.sampler.crop_and_resize(
            feature_map,
            boxes,
            box_index,
            [crop, crop],
            self.config.extrapolation_value,
        )
    }

    /// Crop one segment per box from row features.
    ///
    /// # Arguments
    /// * `rows` - `[N, C, W]`
    /// * `boxes` - `[M, 2]` pixel-space `(x1, x2)`
    /// * `box_index` - `[M]` batch index per box
    ///
    /// # Returns
    /// Tensor of shape `[M, C, crop_width]`
    pub fn forward_rows(
        &self,
        rows: Tensor<B, 3>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
    ) -> Tensor<B, 3> {
        let image_width = rows.dims()[2];
        let crop = self.config.crop_width;

        let boxes =
            normalize_row_boxes_tensor(boxes, image_width, crop, self.config.transform_fpcoor);
        self.report(|| row_boxes_from_tensor(boxes.clone()));

        self.sampler.crop_and_resize_rows(
            rows,
            boxes,
            box_index,
            crop,
            self.config.extrapolation_value,
        )
    }

    /// [`RoiAlign::forward`] after validating config, shapes and input.
    pub fn forward_checked(
        &self,
        feature_map: Tensor<B, 4>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 4>> {
        self.config.validate()?;

        let [n, _, h, w] = feature_map.dims();
        let [m, cols] = boxes.dims();
        if cols != 4 {
            return Err(RoiAlignError::shape_mismatch([m, 4], [m, cols]));
        }

        let host_boxes = boxes_from_tensor(boxes.clone())?;
        let host_index = box_indices_from_tensor(box_index.clone())?;

        let validation = if self.config.normalize_y {
            self.validation.clone()
        } else {
            self.validation.clone().x_only()
        };
        validate_all(
            &ValidationInput {
                boxes: &host_boxes,
                box_index: &host_index,
                batch_size: n,
                image_width: w,
                image_height: self.config.normalize_y.then_some(h),
                crop_width: self.config.crop_width,
                transform_fpcoor: self.config.transform_fpcoor,
            },
            &validation,
        )?;

        Ok(self.forward(feature_map, boxes, box_index))
    }

    /// [`RoiAlign::forward_rows`] after validating config, shapes and input.
    pub fn forward_rows_checked(
        &self,
        rows: Tensor<B, 3>,
        boxes: Tensor<B, 2>,
        box_index: Tensor<B, 1, Int>,
    ) -> Result<Tensor<B, 3>> {
        self.config.validate()?;

        let [n, _, w] = rows.dims();
        let host_boxes = row_boxes_from_tensor(boxes.clone())?;
        let host_index = box_indices_from_tensor(box_index.clone())?;

        validate_all(
            &ValidationInput {
                boxes: &host_boxes,
                box_index: &host_index,
                batch_size: n,
                image_width: w,
                image_height: None,
                crop_width: self.config.crop_width,
                transform_fpcoor: self.config.transform_fpcoor,
            },
            &self.validation.clone().x_only(),
        )?;

        Ok(self.forward_rows(rows, boxes, box_index))
    }

    fn report(&self, boxes: impl FnOnce() -> Result<Vec<RoiBox>>) {
        let Some(observer) = &self.observer else {
            return;
        };
        match boxes() {
            Ok(boxes) => observer.on_normalized(&boxes),
            Err(err) => tracing::warn!("Could not read back normalized boxes: {}", err),
        }
    }
}

impl<B: Backend, S: CropAndResize<B> + fmt::Debug> fmt::Debug for RoiAlign<B, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoiAlign")
            .field("config", &self.config)
            .field("sampler", &self.sampler)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
