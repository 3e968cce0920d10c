use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::DType;
use candle_nn::VarBuilder;
use manydepth_image::ImageSize;
use manydepth_nn::depth_decoder::DepthDecoderNet;
use manydepth_nn::matching::{MatchingConfig, ResnetEncoderMatching};
use manydepth_nn::pose_decoder::PoseDecoderNet;
use manydepth_nn::resnet::{ResnetEncoder, NUM_CH_ENC};
use manydepth_nn::DepthBinRange;
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::ManyDepthError;
use crate::pipeline::Networks;

/// File holding the matching encoder weights and the checkpoint metadata.
pub const ENCODER_FILE: &str = "encoder.safetensors";
/// File holding the depth decoder weights.
pub const DEPTH_FILE: &str = "depth.safetensors";
/// File holding the pose encoder weights.
pub const POSE_ENCODER_FILE: &str = "pose_encoder.safetensors";
/// File holding the pose decoder weights.
pub const POSE_FILE: &str = "pose.safetensors";

// input sizes must survive the five stride-2 stages of the encoder
const SIZE_MULTIPLE: usize = 32;

/// Training-time values stored alongside the matching encoder weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// network input width
    pub width: usize,
    /// network input height
    pub height: usize,
    /// nearest depth of the cost volume sweep
    pub min_depth_bin: f32,
    /// farthest depth of the cost volume sweep
    pub max_depth_bin: f32,
}

impl CheckpointMetadata {
    /// Read the metadata from the header of a safetensors file.
    ///
    /// The values are stored as strings in the `__metadata__` section.
    pub fn from_safetensors(path: impl AsRef<Path>) -> Result<Self, ManyDepthError> {
        let path = path.as_ref();
        let mismatch =
            |msg: String| ManyDepthError::CheckpointMismatch(format!("{}: {msg}", path.display()));

        let file = std::fs::File::open(path).map_err(|e| mismatch(e.to_string()))?;
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| mismatch(e.to_string()))?;

        let (_, metadata) =
            safetensors::SafeTensors::read_metadata(&mmap).map_err(|e| mismatch(e.to_string()))?;
        let header = metadata
            .metadata()
            .as_ref()
            .ok_or_else(|| mismatch("the file has no metadata header".to_string()))?;

        Self::from_header(header)
    }

    /// Parse and validate the metadata from string key-value pairs.
    pub fn from_header(header: &HashMap<String, String>) -> Result<Self, ManyDepthError> {
        // numbers are stored as strings, parse them back to json values
        let object = header
            .iter()
            .map(|(key, value)| {
                let value = serde_json::from_str(value)
                    .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
                (key.clone(), value)
            })
            .collect::<serde_json::Map<_, _>>();

        let metadata: Self = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ManyDepthError::CheckpointMismatch(e.to_string()))?;
        metadata.validate()?;

        Ok(metadata)
    }

    /// The metadata as string key-value pairs.
    pub fn to_header(&self) -> HashMap<String, String> {
        HashMap::from([
            ("width".to_string(), self.width.to_string()),
            ("height".to_string(), self.height.to_string()),
            ("min_depth_bin".to_string(), self.min_depth_bin.to_string()),
            ("max_depth_bin".to_string(), self.max_depth_bin.to_string()),
        ])
    }

    /// Check the input size and the depth range.
    pub fn validate(&self) -> Result<(), ManyDepthError> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 || value % SIZE_MULTIPLE != 0 {
                return Err(ManyDepthError::CheckpointMismatch(format!(
                    "{name} must be a positive multiple of {SIZE_MULTIPLE}, got {value}"
                )));
            }
        }
        self.depth_range()?;
        Ok(())
    }

    /// The network input resolution.
    pub fn input_size(&self) -> ImageSize {
        ImageSize {
            width: self.width,
            height: self.height,
        }
    }

    /// The depth range swept by the cost volume.
    pub fn depth_range(&self) -> Result<DepthBinRange, ManyDepthError> {
        DepthBinRange::new(self.min_depth_bin, self.max_depth_bin)
            .map_err(|e| ManyDepthError::CheckpointMismatch(e.to_string()))
    }
}

/// Paths of the four weight files of a checkpoint directory.
#[derive(Debug, Clone)]
pub struct CheckpointFiles {
    /// the matching encoder
    pub encoder: PathBuf,
    /// the depth decoder
    pub depth: PathBuf,
    /// the pose encoder
    pub pose_encoder: PathBuf,
    /// the pose decoder
    pub pose: PathBuf,
}

impl CheckpointFiles {
    /// Locate the weight files, failing if any of them is missing.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, ManyDepthError> {
        let dir = dir.as_ref();
        let file = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(ManyDepthError::CheckpointMismatch(format!(
                    "missing weight file {}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            encoder: file(ENCODER_FILE)?,
            depth: file(DEPTH_FILE)?,
            pose_encoder: file(POSE_ENCODER_FILE)?,
            pose: file(POSE_FILE)?,
        })
    }
}

fn var_builder(path: &Path, ctx: &ExecutionContext) -> Result<VarBuilder<'static>, ManyDepthError> {
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, ctx.device()) };
    vb.map_err(|e| ManyDepthError::CheckpointMismatch(format!("{}: {e}", path.display())))
}

fn loaded<T, E: std::fmt::Display>(path: &Path, res: Result<T, E>) -> Result<T, ManyDepthError> {
    res.map_err(|e| ManyDepthError::CheckpointMismatch(format!("{}: {e}", path.display())))
}

/// Load the metadata and the four networks of a checkpoint directory.
///
/// # Arguments
///
/// * `dir` - The directory holding the four weight files.
/// * `config` - The cost volume hyper-parameters the encoder was trained with.
/// * `ctx` - The execution context the weights are placed on.
pub fn load_checkpoint(
    dir: impl AsRef<Path>,
    config: MatchingConfig,
    ctx: &ExecutionContext,
) -> Result<(CheckpointMetadata, Networks), ManyDepthError> {
    let files = CheckpointFiles::in_dir(&dir)?;

    log::info!("loading model from {}", dir.as_ref().display());

    let metadata = CheckpointMetadata::from_safetensors(&files.encoder)?;
    log::info!(
        "checkpoint input size {}, depth bins [{}, {}]",
        metadata.input_size(),
        metadata.min_depth_bin,
        metadata.max_depth_bin
    );

    log::info!("loading encoder");
    let encoder = loaded(
        &files.encoder,
        ResnetEncoderMatching::new(
            config,
            metadata.depth_range()?,
            var_builder(&files.encoder, ctx)?,
        ),
    )?;

    log::info!("loading depth decoder");
    let depth_decoder = loaded(
        &files.depth,
        DepthDecoderNet::resnet(var_builder(&files.depth, ctx)?),
    )?;

    log::info!("loading pose network");
    let pose_encoder = loaded(
        &files.pose_encoder,
        ResnetEncoder::new(config.resnet, 2, var_builder(&files.pose_encoder, ctx)?),
    )?;
    let pose_decoder = loaded(
        &files.pose,
        PoseDecoderNet::new(NUM_CH_ENC[4], 1, 2, var_builder(&files.pose, ctx)?),
    )?;

    Ok((
        metadata,
        Networks {
            pose_encoder: Box::new(pose_encoder),
            pose_decoder: Box::new(pose_decoder),
            encoder: Box::new(encoder),
            depth_decoder: Box::new(depth_decoder),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};

    fn metadata() -> CheckpointMetadata {
        CheckpointMetadata {
            width: 640,
            height: 192,
            min_depth_bin: 0.1,
            max_depth_bin: 20.0,
        }
    }

    #[test]
    fn header_round_trip() -> Result<(), ManyDepthError> {
        let parsed = CheckpointMetadata::from_header(&metadata().to_header())?;
        assert_eq!(parsed, metadata());
        Ok(())
    }

    #[test]
    fn header_with_extra_keys() -> Result<(), ManyDepthError> {
        let mut header = metadata().to_header();
        header.insert("format".to_string(), "pt".to_string());
        header.insert("epoch".to_string(), "19".to_string());
        assert_eq!(CheckpointMetadata::from_header(&header)?, metadata());
        Ok(())
    }

    #[test]
    fn invalid_headers() {
        let mut missing = metadata().to_header();
        missing.remove("max_depth_bin");

        let mut not_a_number = metadata().to_header();
        not_a_number.insert("width".to_string(), "wide".to_string());

        let mut odd_size = metadata().to_header();
        odd_size.insert("height".to_string(), "190".to_string());

        let mut bad_range = metadata().to_header();
        bad_range.insert("min_depth_bin".to_string(), "30".to_string());

        for header in [missing, not_a_number, odd_size, bad_range] {
            assert!(matches!(
                CheckpointMetadata::from_header(&header),
                Err(ManyDepthError::CheckpointMismatch(_))
            ));
        }
    }

    #[test]
    fn read_from_safetensors() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join(ENCODER_FILE);

        let tensors = [("dummy", Tensor::zeros(4, DType::F32, &Device::Cpu)?)];
        safetensors::serialize_to_file(tensors, Some(metadata().to_header()), &path)?;
        assert_eq!(CheckpointMetadata::from_safetensors(&path)?, metadata());

        let bare = tmp_dir.path().join("bare.safetensors");
        let tensors = [("dummy", Tensor::zeros(4, DType::F32, &Device::Cpu)?)];
        safetensors::serialize_to_file(tensors, None, &bare)?;
        assert!(matches!(
            CheckpointMetadata::from_safetensors(&bare),
            Err(ManyDepthError::CheckpointMismatch(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_files() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        std::fs::write(tmp_dir.path().join(ENCODER_FILE), b"")?;
        assert!(matches!(
            CheckpointFiles::in_dir(tmp_dir.path()),
            Err(ManyDepthError::CheckpointMismatch(_))
        ));
        Ok(())
    }
}
