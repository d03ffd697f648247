//! V4L2 webcam capture.
//!
//! Only `VIDEO_CAPTURE` devices that deliver JPEG or Motion JPEG frames at discrete sizes and
//! rates can be opened.

use std::{cmp::Reverse, env};

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::timer::Timer;

/// Overrides the device name of every [`WebcamOptions`].
const DEVICE_NAME_VAR: &str = "HANDSIGN_WEBCAM_NAME";

/// Lower bounds for the negotiated format. Either may be given up if no format meets both.
#[derive(Debug, Default, Clone, Copy)]
struct FrameTarget {
    resolution: Option<Resolution>,
    fps: Option<u32>,
}

impl FrameTarget {
    fn accepts(&self, format: &FrameFormat) -> bool {
        let res_ok = self.resolution.map_or(true, |res| format.resolution.covers(res));
        let fps_ok = self
            .fps
            .map_or(true, |fps| format.fps().round() >= fps as f32);
        res_ok && fps_ok
    }
}

/// Which camera to open and what to ask it for.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    index: usize,
    target: FrameTarget,
}

impl WebcamOptions {
    /// Only considers devices with this name. Opening fails if there is none.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Skips the first `index` usable devices.
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Minimum resolution. Kept in preference to the frame rate if the camera cannot do both.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.target.resolution = Some(resolution);
        self
    }

    /// Minimum frame rate. Given up first if the camera cannot deliver it.
    pub fn fps(mut self, fps: u32) -> Self {
        self.target.fps = Some(fps);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.interval.as_f32()
    }
}

/// Relaxes `target` (frame rate first) until some format in `formats` meets it.
fn select_format(formats: &[FrameFormat], mut target: FrameTarget) -> Option<FrameFormat> {
    loop {
        if let Some(format) = best_match(formats, target) {
            return Some(format);
        }
        if target.fps.take().is_none() && target.resolution.take().is_none() {
            return None;
        }
        log::debug!("no webcam format matches, relaxing to {target:?}");
    }
}

/// With a resolution target, the smallest format meeting it. Otherwise the largest.
///
/// Ties go to the higher frame rate.
fn best_match(formats: &[FrameFormat], target: FrameTarget) -> Option<FrameFormat> {
    let candidates = formats.iter().copied().filter(|f| target.accepts(f));
    match target.resolution {
        Some(_) => candidates.min_by_key(|f| (f.resolution.pixel_count(), f.interval)),
        None => candidates.max_by_key(|f| (f.resolution.pixel_count(), Reverse(f.interval))),
    }
}

/// Lists the discrete sizes and rates `device` offers for `pixfmt`.
fn frame_formats(device: &Device, pixfmt: Pixelformat) -> anyhow::Result<Vec<FrameFormat>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(pixfmt)? else {
        bail!("only discrete frame sizes are supported");
    };

    let mut formats = Vec::new();
    for size in sizes {
        let (width, height) = (size.width(), size.height());
        let FrameIntervals::Discrete(intervals) = device.frame_intervals(pixfmt, width, height)?
        else {
            bail!("only discrete frame intervals are supported");
        };
        formats.extend(intervals.into_iter().map(|interval| FrameFormat {
            resolution: Resolution::new(width, height),
            interval: *interval.fract(),
        }));
    }
    Ok(formats)
}

/// Returns the capture format to use, or `None` if `device` is not a usable camera named `name`.
fn capture_format(
    device: &Device,
    name: Option<&str>,
    target: FrameTarget,
) -> anyhow::Result<Option<(PixFormat, Fract)>> {
    let caps = device.capabilities()?;
    if name.map_or(false, |name| caps.card() != name) {
        return Ok(None);
    }
    let flags = caps.device_capabilities();
    log::debug!("{} ({}): {flags:?}", caps.card(), device.path()?.display());
    if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
        return Ok(None);
    }

    let mut jpeg = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let pixfmt = format?.pixelformat();
        if pixfmt == Pixelformat::JPEG || pixfmt == Pixelformat::MJPG {
            jpeg = Some(pixfmt);
            break;
        }
    }
    let Some(pixfmt) = jpeg else {
        bail!("{} has no JPEG output", caps.card());
    };

    let Some(best) = select_format(&frame_formats(device, pixfmt)?, target) else {
        bail!("{} offers no frame format", caps.card());
    };
    let res = best.resolution;
    Ok(Some((
        PixFormat::new(res.width(), res.height(), pixfmt),
        best.interval,
    )))
}

/// A camera delivering decoded frames.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the camera selected by `options`. Blocks while the device starts up.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let name = match env::var(DEVICE_NAME_VAR) {
            Ok(name) => {
                log::debug!("{DEVICE_NAME_VAR} selects webcam '{name}'");
                Some(name)
            }
            Err(_) => options.name.clone(),
        };

        let mut usable = 0;
        for device in linuxvideo::list()? {
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("{e}");
                    continue;
                }
            };
            match capture_format(&device, name.as_deref(), options.target) {
                Ok(Some(format)) if usable == options.index => {
                    return Self::start(device, format)
                }
                Ok(Some(_)) => usable += 1,
                Ok(None) => {}
                Err(e) => log::debug!("{e}"),
            }
        }

        match name {
            Some(name) => bail!("no usable webcam named '{name}'"),
            None => bail!("no usable webcam #{}", options.index),
        }
    }

    fn start(device: Device, (pixfmt, interval): (PixFormat, Fract)) -> anyhow::Result<Self> {
        let card = device.capabilities()?.card().to_string();
        let path = device.path()?;
        let capture = device.video_capture(pixfmt)?;
        let resolution = Resolution::new(capture.format().width(), capture.format().height());
        let interval = capture.set_frame_interval(interval)?;
        log::info!(
            "opened {card} ({}), {resolution} @ {:.1}Hz",
            path.display(),
            1.0 / interval.as_f32(),
        );

        Ok(Self {
            stream: capture.into_stream(2)?,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Blocks until the next frame arrives.
    ///
    /// A frame that fails to decode is logged and comes back blank, so an error here means the
    /// device itself failed.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let waiting = self.t_dequeue.start();
        let res = self.resolution;
        let t_decode = &self.t_decode;
        let image = self.stream.dequeue(|buf| {
            drop(waiting);
            // Corrupt MJPEG frames happen on busy USB buses. A blank frame keeps the pace.
            let image = t_decode
                .time(|| Image::decode_jpeg(&buf))
                .unwrap_or_else(|e| {
                    log::error!("webcam frame: {e:#}");
                    Image::new(res.width(), res.height())
                });
            Ok(image)
        })?;
        Ok(image)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(w: u32, h: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(w, h),
            interval: Fract::new(1, fps),
        }
    }

    fn target(resolution: Option<(u32, u32)>, fps: Option<u32>) -> FrameTarget {
        FrameTarget {
            resolution: resolution.map(|(w, h)| Resolution::new(w, h)),
            fps,
        }
    }

    #[test]
    fn largest_without_target() {
        let formats = [format(640, 480, 30), format(1920, 1080, 30), format(1280, 720, 60)];
        let best = select_format(&formats, FrameTarget::default()).unwrap();
        assert_eq!(best.resolution, Resolution::new(1920, 1080));
    }

    #[test]
    fn smallest_meeting_resolution() {
        let formats = [format(640, 480, 30), format(1920, 1080, 30), format(1280, 720, 30)];
        let best = select_format(&formats, target(Some((1280, 720)), None)).unwrap();
        assert_eq!(best.resolution, Resolution::new(1280, 720));
    }

    #[test]
    fn frame_rate_given_up_first() {
        let formats = [format(640, 480, 60), format(1280, 720, 30)];
        let best = select_format(&formats, target(Some((1280, 720)), Some(60))).unwrap();
        assert_eq!(best.resolution, Resolution::new(1280, 720));

        let best = select_format(&formats, target(None, Some(60))).unwrap();
        assert_eq!(best.resolution, Resolution::new(640, 480));
    }

    #[test]
    fn higher_rate_breaks_ties() {
        let formats = [format(640, 480, 15), format(640, 480, 30)];
        let best = select_format(&formats, target(Some((640, 480)), None)).unwrap();
        assert_eq!(best.interval, Fract::new(1, 30));
        let best = select_format(&formats, FrameTarget::default()).unwrap();
        assert_eq!(best.interval, Fract::new(1, 30));
    }

    #[test]
    fn no_formats() {
        assert_eq!(select_format(&[], FrameTarget::default()), None);
    }
}
