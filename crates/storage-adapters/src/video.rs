//! libav-backed video probing and still extraction (`video` feature).

use std::path::Path;

use domains::{IngestError, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use image::RgbImage;

/// Demuxer, index of the best video stream, and its decoder.
type OpenedVideo = (ffmpeg::format::context::Input, usize, ffmpeg::decoder::Video);

fn open_decoder(path: &Path) -> std::result::Result<OpenedVideo, ffmpeg::Error> {
    ffmpeg::init()?;
    let input = ffmpeg::format::input(&path)?;
    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or(ffmpeg::Error::StreamNotFound)?;
    let index = stream.index();
    let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = context.decoder().video()?;
    Ok((input, index, decoder))
}

/// Coded size of the best video stream.
pub(crate) fn probe_dimensions(path: &Path) -> Option<(u32, u32)> {
    let (_, _, decoder) = open_decoder(path)
        .inspect_err(|e| tracing::debug!(error = %e, "libav probe failed"))
        .ok()?;
    match (decoder.width(), decoder.height()) {
        (0, _) | (_, 0) => None,
        size => Some(size),
    }
}

/// Decodes the first frame of the best video stream as RGB.
pub(crate) fn first_frame(path: &Path) -> Result<RgbImage> {
    let unavailable =
        |e: ffmpeg::Error| IngestError::ThumbnailUnavailable(format!("video decoding failed: {e}"));

    let (mut input, index, mut decoder) = open_decoder(path).map_err(unavailable)?;
    let (width, height) = (decoder.width(), decoder.height());
    let mut scaler = Scaler::get(
        decoder.format(),
        width,
        height,
        Pixel::RGB24,
        width,
        height,
        Flags::BILINEAR,
    )
    .map_err(unavailable)?;

    let mut decoded = VideoFrame::empty();
    for (stream, packet) in input.packets() {
        if stream.index() != index {
            continue;
        }
        decoder.send_packet(&packet).map_err(unavailable)?;
        if decoder.receive_frame(&mut decoded).is_ok() {
            let mut rgb = VideoFrame::empty();
            scaler.run(&decoded, &mut rgb).map_err(unavailable)?;
            return frame_to_image(&rgb);
        }
    }

    decoder.send_eof().map_err(unavailable)?;
    if decoder.receive_frame(&mut decoded).is_ok() {
        let mut rgb = VideoFrame::empty();
        scaler.run(&decoded, &mut rgb).map_err(unavailable)?;
        return frame_to_image(&rgb);
    }
    Err(IngestError::ThumbnailUnavailable("video has no decodable frame".to_string()))
}

fn frame_to_image(frame: &VideoFrame) -> Result<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);

    // rows are padded to the stride
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| IngestError::ThumbnailUnavailable("frame buffer size mismatch".to_string()))
}
