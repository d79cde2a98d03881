//! RoI Align Example
//!
//! Crops two regions from a synthetic feature map, logs the normalized boxes
//! and checks that gradients reach the feature map.
//!
//! Usage:
//!   RUST_LOG=debug cargo run --example roi_align

use std::sync::Arc;

use burn::backend::Autodiff;
use burn::tensor::{Distribution, Int, Tensor};
use burn_ndarray::NdArray;
use roialign_core::TracingObserver;
use roialign_model::RoiAlignConfig;

type Backend = Autodiff<NdArray<f32>>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let device = Default::default();

    let feature_map = Tensor::<Backend, 4>::random(
        [2, 8, 56, 56],
        Distribution::Normal(0.0, 1.0),
        &device,
    )
    .require_grad();
    let boxes = Tensor::<Backend, 2>::from_floats(
        [[8.0, 8.0, 24.0, 40.0], [30.0, 2.0, 54.0, 20.0]],
        &device,
    );
    let box_index = Tensor::<Backend, 1, Int>::from_ints([0, 1], &device);

    let config = RoiAlignConfig::new(7);
    let roi_align = config
        .init::<Backend>()
        .with_observer(Arc::new(TracingObserver::default()));

    let crops = roi_align.forward_checked(feature_map.clone(), boxes, box_index)?;
    println!("Crops: {:?}", crops.dims());

    let grads = crops.sum().backward();
    let grad = feature_map
        .grad(&grads)
        .ok_or_else(|| anyhow::anyhow!("feature map has no gradient"))?;
    let touched: f32 = grad.abs().greater_elem(0.0).float().sum().into_scalar();
    println!("Feature map elements receiving gradient: {}", touched);

    Ok(())
}
