use candle_core::Device;

/// The device the pipeline should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// Run on the CPU.
    Cpu,
    /// Run on the CUDA device with the given ordinal, falling back to the CPU.
    Cuda(usize),
}

impl Default for DeviceRequest {
    fn default() -> Self {
        DeviceRequest::Cuda(0)
    }
}

/// Where tensors live for the lifetime of a pipeline.
///
/// The device is resolved once and handed to every component at construction.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    device: Device,
}

impl ExecutionContext {
    /// Resolve the requested device.
    ///
    /// An unavailable accelerator is never an error: a warning is logged and the CPU
    /// is used instead.
    pub fn new(request: DeviceRequest) -> Self {
        let device = match request {
            DeviceRequest::Cpu => Device::Cpu,
            DeviceRequest::Cuda(ordinal) => match Device::cuda_if_available(ordinal) {
                Ok(device) if device.is_cuda() => device,
                Ok(device) => {
                    log::warn!("CUDA is not available, using CPU instead");
                    device
                }
                Err(e) => {
                    log::warn!("Failed to use CUDA, using CPU instead: {}", e);
                    Device::Cpu
                }
            },
        };

        log::debug!("execution device: {:?}", device);

        Self { device }
    }

    /// A context on the CPU.
    pub fn cpu() -> Self {
        Self::new(DeviceRequest::Cpu)
    }

    /// The resolved device.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(DeviceRequest::default())
    }
}
