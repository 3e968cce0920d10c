use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use manydepth::checkpoint::{
    CheckpointMetadata, DEPTH_FILE, ENCODER_FILE, POSE_ENCODER_FILE, POSE_FILE,
};
use manydepth::{DepthMode, DepthPipeline, ExecutionContext, ManyDepthError, PredictionRequest};
use manydepth_image::ImageSize;
use manydepth_nn::depth_decoder::DepthDecoderNet;
use manydepth_nn::matching::{MatchingConfig, ResnetEncoderMatching};
use manydepth_nn::pose_decoder::PoseDecoderNet;
use manydepth_nn::resnet::{ResnetDepth, ResnetEncoder, NUM_CH_ENC};
use manydepth_nn::DepthBinRange;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn config() -> MatchingConfig {
    MatchingConfig {
        num_depth_bins: 8,
        ..Default::default()
    }
}

fn metadata() -> CheckpointMetadata {
    CheckpointMetadata {
        width: 128,
        height: 64,
        min_depth_bin: 0.1,
        max_depth_bin: 20.0,
    }
}

fn save(
    varmap: &VarMap,
    header: Option<HashMap<String, String>>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let tensors = varmap
        .data()
        .lock()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|(name, var)| (name.clone(), var.as_tensor().clone()))
        .collect::<Vec<_>>();
    safetensors::serialize_to_file(tensors, header, path)?;
    Ok(())
}

// writes randomly initialized networks with the layout of a converted checkpoint
fn write_checkpoint(dir: &Path) -> TestResult {
    let device = Device::Cpu;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    ResnetEncoderMatching::new(config(), DepthBinRange::new(0.1, 20.0)?, vb.clone())?;
    // unused tensors in the encoder file are ignored
    vb.get_with_hints(3, "prematching_conv.0.bias", candle_nn::Init::Const(0.0))?;
    save(&varmap, Some(metadata().to_header()), &dir.join(ENCODER_FILE))?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    DepthDecoderNet::resnet(vb)?;
    save(&varmap, None, &dir.join(DEPTH_FILE))?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    ResnetEncoder::new(ResnetDepth::Resnet18, 2, vb)?;
    save(&varmap, None, &dir.join(POSE_ENCODER_FILE))?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    PoseDecoderNet::new(NUM_CH_ENC[4], 1, 2, vb)?;
    save(&varmap, None, &dir.join(POSE_FILE))?;

    Ok(())
}

#[test]
fn load_and_predict() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    write_checkpoint(tmp_dir.path())?;

    let target = tmp_dir.path().join("target.png");
    image::RgbImage::from_fn(256, 96, |x, y| image::Rgb([x as u8, (y * 2) as u8, 64]))
        .save(&target)?;
    // the previous frame sees the same gradient shifted to the left
    let source = tmp_dir.path().join("source.png");
    image::RgbImage::from_fn(256, 96, |x, y| {
        image::Rgb([(x + 12) as u8, (y * 2) as u8, (x % 16 * 8) as u8])
    })
    .save(&source)?;
    let intrinsics = tmp_dir.path().join("intrinsics.json");
    std::fs::write(&intrinsics, "[[0.58, 0, 0.5], [0, 1.92, 0.5], [0, 0, 1]]")?;

    let pipeline = DepthPipeline::from_checkpoint_with_config(
        tmp_dir.path(),
        config(),
        ExecutionContext::cpu(),
    )?;
    assert_eq!(pipeline.metadata(), &metadata());

    let mut disparities = Vec::new();
    for mode in [DepthMode::Multi, DepthMode::Mono] {
        let prediction = pipeline.predict(&PredictionRequest {
            target_image_path: target.clone(),
            source_image_path: Some(source.clone()),
            intrinsics_json_path: intrinsics.clone(),
            mode,
        })?;

        assert_eq!(prediction.disparity.dims(), &[1, 1, 64, 128]);
        assert_eq!(prediction.lowest_cost.dims(), &[1, 16, 32]);
        assert_eq!(prediction.confidence_mask.dims(), &[1, 16, 32]);
        assert_eq!(
            prediction.disparity_resized.size(),
            ImageSize {
                width: 256,
                height: 96
            }
        );

        let disparity = prediction.disparity.flatten_all()?.to_vec1::<f32>()?;
        assert!(disparity.iter().all(|v| (0.0..=1.0).contains(v)));
        disparities.push(disparity);
    }

    // the cost volume only feeds the encoder in multi mode
    assert_ne!(disparities[0], disparities[1]);

    Ok(())
}

#[test]
fn incomplete_pose_decoder() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    write_checkpoint(tmp_dir.path())?;

    let tensors = [("net.0.weight", Tensor::zeros((256, 512, 1, 1), DType::F32, &Device::Cpu)?)];
    safetensors::serialize_to_file(tensors, None, &tmp_dir.path().join(POSE_FILE))?;

    let res = DepthPipeline::from_checkpoint_with_config(
        tmp_dir.path(),
        config(),
        ExecutionContext::cpu(),
    );
    assert!(matches!(res, Err(ManyDepthError::CheckpointMismatch(_))));
    Ok(())
}

#[test]
fn encoder_trained_with_other_bins() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    write_checkpoint(tmp_dir.path())?;

    // reduce_conv was saved for 8 bins
    let res = DepthPipeline::from_checkpoint_with_config(
        tmp_dir.path(),
        MatchingConfig::default(),
        ExecutionContext::cpu(),
    );
    assert!(matches!(res, Err(ManyDepthError::CheckpointMismatch(_))));
    Ok(())
}

#[test]
fn missing_metadata() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    write_checkpoint(tmp_dir.path())?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    ResnetEncoderMatching::new(config(), DepthBinRange::new(0.1, 20.0)?, vb)?;
    save(&varmap, None, &tmp_dir.path().join(ENCODER_FILE))?;

    let res = DepthPipeline::from_checkpoint_with_config(
        tmp_dir.path(),
        config(),
        ExecutionContext::cpu(),
    );
    assert!(matches!(res, Err(ManyDepthError::CheckpointMismatch(_))));
    Ok(())
}
