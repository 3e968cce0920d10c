use std::path::PathBuf;

use argh::FromArgs;
use manydepth::postprocess::disparity_to_u16;
use manydepth::{DepthMode, DepthPipeline, DeviceRequest, ExecutionContext, PredictionRequest};
use manydepth_io::functional::write_image_png_gray16;

/// Predicts the depth of a single frame, optionally matched against the previous frame
#[derive(FromArgs)]
struct Args {
    /// path to the image to predict depth for
    #[argh(option)]
    target_image_path: PathBuf,

    /// path to the previous frame, defaults to the target image
    #[argh(option)]
    source_image_path: Option<PathBuf>,

    /// path to a json file with the normalized 3x3 intrinsics
    #[argh(option)]
    intrinsics_json_path: PathBuf,

    /// directory with the encoder, depth, pose_encoder and pose safetensors
    #[argh(option)]
    model_path: PathBuf,

    /// depth mode: "multi" to use the source frame, "mono" to ignore it
    #[argh(option, default = "DepthMode::Multi")]
    mode: DepthMode,

    /// where to save the disparity as a 16-bit png
    #[argh(option)]
    output: Option<PathBuf>,

    /// run on the cpu even if a gpu is available
    #[argh(switch)]
    cpu: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let ctx = ExecutionContext::new(if args.cpu {
        DeviceRequest::Cpu
    } else {
        DeviceRequest::default()
    });

    let pipeline = DepthPipeline::from_checkpoint(&args.model_path, ctx)?;

    let now = std::time::Instant::now();

    let prediction = pipeline.predict(&PredictionRequest {
        target_image_path: args.target_image_path.clone(),
        source_image_path: args.source_image_path,
        intrinsics_json_path: args.intrinsics_json_path,
        mode: args.mode,
    })?;

    log::info!("prediction took {:?}", now.elapsed());

    let disparity = prediction.disparity_resized.as_slice();
    let (min, max) = disparity
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    println!(
        "{}: disparity {} in [{min:.4}, {max:.4}] ({} mode)",
        args.target_image_path.display(),
        prediction.original_size,
        args.mode
    );

    let output = args
        .output
        .unwrap_or_else(|| args.target_image_path.with_extension("disp.png"));
    write_image_png_gray16(&output, &disparity_to_u16(&prediction.disparity_resized)?)?;

    println!("saved the disparity to {}", output.display());

    Ok(())
}
