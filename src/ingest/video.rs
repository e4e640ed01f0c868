//! Local video file decoding using FFmpeg.
//!
//! Frames are decoded strictly forward. Frames the source decimates away are
//! decoded but never converted to RGB.

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

pub(crate) struct VideoFile {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: RgbScaler,
    fps: Option<f64>,
    decoded: u64,
    flushed: bool,
}

/// Owned by the source thread; never shared.
struct RgbScaler(ffmpeg::software::scaling::Context);

// SAFETY: the SwsContext is only touched through `&mut self` by the thread
// that currently owns the `VideoFile`.
unsafe impl Send for RgbScaler {}

impl VideoFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video file {}", path.display()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("{} has no video track", path.display()))?;
        let stream_index = stream.index();
        let fps = fps_from_ratio(stream.avg_frame_rate())
            .or_else(|| fps_from_ratio(stream.rate()));
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FrameSource: video {} {}x{} @ {}",
            path.display(),
            decoder.width(),
            decoder.height(),
            fps.map_or_else(|| "unknown fps".to_string(), |fps| format!("{:.2} fps", fps))
        );
        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler: RgbScaler(scaler),
            fps,
            decoded: 0,
            flushed: false,
        })
    }

    /// Average frame rate declared by the container, if it declares one.
    pub(crate) fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Frame `index`, decoding and discarding the frames before it.
    ///
    /// Indices must not go backwards.
    pub(crate) fn frame_at(&mut self, index: u64) -> Result<Option<RgbImage>> {
        if index < self.decoded {
            bail!(
                "video frame {} already passed (next frame is {})",
                index,
                self.decoded
            );
        }
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if !self.decode_next(&mut decoded)? {
                return Ok(None);
            }
            if self.decoded - 1 == index {
                return self.convert(&decoded).map(Some);
            }
        }
    }

    /// Decode one more frame into `decoded`; false at end of file.
    fn decode_next(&mut self, decoded: &mut ffmpeg::frame::Video) -> Result<bool> {
        loop {
            if self.decoder.receive_frame(decoded).is_ok() {
                self.decoded += 1;
                return Ok(true);
            }
            if self.flushed {
                return Ok(false);
            }
            match self.next_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.flushed = true;
                }
            }
        }
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input.packets() {
            if stream.index() == self.stream_index {
                return Some(packet);
            }
        }
        None
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .0
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        frame_to_image(&rgb_frame)
    }
}

fn fps_from_ratio(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.denominator() == 0 {
        return None;
    }
    let fps = f64::from(rate.numerator()) / f64::from(rate.denominator());
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Copy an RGB24 frame into an image, dropping row padding.
fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("decoded frame does not fill {}x{}", width, height))
}
