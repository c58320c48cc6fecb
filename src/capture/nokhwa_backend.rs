//! Nokhwa-based webcam capture backend.

use super::{CameraInfo, CaptureConfig, FrameSource};
use crate::frame::{PixelFormat, VideoFrame};
use anyhow::Result;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// Webcam capture using the nokhwa library.
pub struct NokhwaCapture {
    camera: Camera,
    width: u32,
    height: u32,
}

impl NokhwaCapture {
    /// Known-good formats to probe when opening a device. Some drivers reject
    /// `Closest` requests whose hint is far from anything they support, so we
    /// walk a ladder from the requested size down to VGA, preferring
    /// uncompressed formats (built-in cameras) before MJPEG (USB cameras).
    fn seed_formats(config: &CaptureConfig) -> Vec<CameraFormat> {
        let mut resolutions = vec![
            Resolution::new(config.width, config.height),
            Resolution::new(1280, 720),
            Resolution::new(640, 480),
        ];
        resolutions.dedup();

        let mut seeds = Vec::new();
        for res in resolutions {
            for format in [FrameFormat::NV12, FrameFormat::YUYV, FrameFormat::MJPEG] {
                seeds.push(CameraFormat::new(res, format, config.fps));
            }
        }
        seeds
    }

    /// Scores a format for the post-open upgrade pass: resolution first,
    /// frame rate second, uncompressed formats as a tie-breaker.
    fn format_score(fmt: &CameraFormat) -> i64 {
        let mut score = (fmt.width() as i64) * (fmt.height() as i64);
        score += (fmt.frame_rate() as i64) * 1000;
        score += match fmt.format() {
            FrameFormat::NV12 => 30,
            FrameFormat::YUYV => 20,
            FrameFormat::MJPEG => 10,
            _ => 0,
        };
        score
    }
}

impl FrameSource for NokhwaCapture {
    fn list_devices() -> Result<Vec<CameraInfo>> {
        let devices = nokhwa::query(nokhwa::utils::ApiBackend::Auto)?;
        Ok(devices
            .into_iter()
            .map(|d| CameraInfo {
                index: d.index().as_index().unwrap_or(0),
                name: d.human_name().to_string(),
            })
            .collect())
    }

    fn open(config: CaptureConfig) -> Result<Self> {
        let mut camera = None;
        let mut active_seed = None;

        for seed in Self::seed_formats(&config) {
            let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(seed));
            let idx = CameraIndex::Index(config.device_index);

            if let Ok(mut cam) = Camera::new(idx, requested) {
                // Creating the object is not enough for some drivers; the
                // stream has to actually open.
                if cam.open_stream().is_ok() {
                    tracing::info!("Camera connected with seed format {:?}", seed);
                    active_seed = Some(seed);
                    camera = Some(cam);
                    break;
                }
            }
        }

        let mut camera = camera.ok_or_else(|| {
            anyhow::anyhow!(
                "Could not open a stream on camera index {} with any standard format",
                config.device_index
            )
        })?;

        // The device is open; see whether it advertises something better than
        // the seed that happened to work. Empty lists occur in the wild, in
        // which case the seed stays.
        if let Ok(supported) = camera.compatible_camera_formats() {
            let best = supported.iter().copied().max_by_key(Self::format_score);
            if let Some(better) = best {
                tracing::info!("Upgrading to reported format {:?}", better);
                let _ = camera.stop_stream();
                let request =
                    RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(better));
                if camera.set_camera_requset(request).is_ok() {
                    if let Err(e) = camera.open_stream() {
                        tracing::warn!("Upgrade failed ({}), reverting to seed format", e);
                        if let Some(seed) = active_seed {
                            let request = RequestedFormat::new::<RgbFormat>(
                                RequestedFormatType::Closest(seed),
                            );
                            let _ = camera.set_camera_requset(request);
                            let _ = camera.open_stream();
                        }
                    }
                } else {
                    let _ = camera.open_stream();
                }
            }
        }

        let resolution = camera.resolution();
        tracing::info!("Camera opened with resolution {}", resolution);

        Ok(Self {
            camera,
            width: resolution.width(),
            height: resolution.height(),
        })
    }

    fn capture_frame(&mut self) -> Result<VideoFrame> {
        let frame = self.camera.frame()?;
        let decoded = frame.decode_image::<RgbFormat>()?;
        let rgb_data = decoded.into_raw();

        Ok(VideoFrame::from_data(
            self.width,
            self.height,
            PixelFormat::Rgb,
            rgb_data,
        ))
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
