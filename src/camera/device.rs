//! Camera device implementation

use crate::camera::{CameraConfig, PixelFormat};
use crate::error::{Error, Result};
use image::{DynamicImage, ImageBuffer, RgbImage};
use serde::{Deserialize, Serialize};
use std::mem;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Information about a V4L2 node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDevice {
    /// Device index (e.g., 0 for /dev/video0)
    pub index: usize,
    /// Device path (e.g., "/dev/video0")
    pub path: String,
    /// Card name reported by the driver
    pub name: String,
    /// Driver name
    pub driver: String,
    /// Bus information
    pub bus_info: String,
}

impl From<&CameraDevice> for crate::device::VideoDevice {
    fn from(dev: &CameraDevice) -> Self {
        crate::device::VideoDevice::new(dev.path.clone(), dev.name.clone())
    }
}

/// An open camera streaming frames through mapped buffers
pub struct Camera {
    // Field order matters: the stream borrows the device and must drop first.
    stream: MmapStream<'static>,
    _device: Box<Device>,
    config: CameraConfig,
    info: CameraDevice,
}

impl Camera {
    /// Open `info` and configure it according to `config`
    pub fn open(info: CameraDevice, config: CameraConfig) -> Result<Self> {
        let dev = Device::with_path(&info.path)
            .map_err(|e| Error::from_camera_io(&info.path, e))?;

        let mut fmt = dev
            .format()
            .map_err(|e| Error::Camera(format!("Failed to get format: {e}")))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = config.format.to_fourcc();
        let fmt = dev
            .set_format(&fmt)
            .map_err(|e| Error::Camera(format!("Failed to set format: {e}")))?;

        let mut params = dev
            .params()
            .map_err(|e| Error::Camera(format!("Failed to get params: {e}")))?;
        params.interval = v4l::Fraction::new(1, config.fps.max(1));
        dev.set_params(&params)
            .map_err(|e| Error::Camera(format!("Failed to set params: {e}")))?;

        tracing::info!(
            device = %info.path,
            name = %info.name,
            width = fmt.width,
            height = fmt.height,
            fps = config.fps,
            fourcc = %String::from_utf8_lossy(&fmt.fourcc.repr),
            "camera configured"
        );

        // The driver may have negotiated a different size.
        let config = CameraConfig {
            width: fmt.width,
            height: fmt.height,
            ..config
        };

        let device = Box::new(dev);
        // SAFETY: the boxed device is never moved out of `Camera` and is
        // dropped after the stream (declaration order).
        let static_device: &'static Device =
            unsafe { mem::transmute::<&Device, &'static Device>(device.as_ref()) };

        let stream =
            MmapStream::with_buffers(static_device, Type::VideoCapture, config.buffer_count.max(2))
                .map_err(|e| Error::FrameCapture(format!("Failed to create stream: {e}")))?;

        Ok(Self {
            stream,
            _device: device,
            config,
            info,
        })
    }

    /// Device this camera was opened from
    pub fn info(&self) -> &CameraDevice {
        &self.info
    }

    /// Effective capture configuration
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Dequeue the next frame and convert it to an image
    pub fn capture_frame(&mut self) -> Result<DynamicImage> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| Error::FrameCapture(e.to_string()))?;

        match self.config.format {
            PixelFormat::Mjpeg => {
                image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
                    .map_err(|e| Error::Image(format!("MJPEG decode failed: {e}")))
            }
            PixelFormat::Yuyv => yuyv_to_rgb(buf, self.config.width, self.config.height),
            PixelFormat::Rgb24 => {
                RgbImage::from_raw(self.config.width, self.config.height, buf.to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| Error::Image("RGB24 buffer too short".to_string()))
            }
        }
    }
}

/// Convert a packed YUYV 4:2:2 buffer to RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    let pixels = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixels * 3);

    for chunk in yuyv.chunks_exact(4).take(pixels / 2) {
        let u = chunk[1] as i32 - 128;
        let v = chunk[3] as i32 - 128;
        for y in [chunk[0] as i32, chunk[2] as i32] {
            rgb.push((y + ((v * 1436) >> 10)).clamp(0, 255) as u8);
            rgb.push((y - ((u * 352 + v * 731) >> 10)).clamp(0, 255) as u8);
            rgb.push((y + ((u * 1814) >> 10)).clamp(0, 255) as u8);
        }
    }
    rgb.resize(pixels * 3, 0);

    ImageBuffer::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| Error::Image("Failed to create RGB image from YUYV".to_string()))
}
