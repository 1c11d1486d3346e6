use candle_core::Device;

pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            tracing::info!("device: Metal");
            return dev;
        }
    }
    tracing::info!("device: CPU");
    Device::Cpu
}
