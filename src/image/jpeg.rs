//! JPEG frame decoding with a selectable backend.

use std::{env, process};

use anyhow::{anyhow, bail, Context};
use once_cell::sync::Lazy;
use zune_jpeg::zune_core::{colorspace::ColorSpace, options::DecoderOptions};

use super::{Image, Resolution};

const BACKEND_VAR: &str = "HANDSIGN_JPEG_BACKEND";

#[derive(Debug, Clone, Copy)]
enum Backend {
    /// `zune-jpeg`, the faster of the two.
    Zune,
    /// `jpeg-decoder`, kept as a fallback for streams `zune-jpeg` rejects.
    JpegDecoder,
}

static BACKEND: Lazy<Backend> = Lazy::new(|| {
    let backend = match env::var_os(BACKEND_VAR) {
        None => Backend::Zune,
        Some(v) if v == "zune-jpeg" => Backend::Zune,
        Some(v) if v == "jpeg-decoder" => Backend::JpegDecoder,
        Some(v) => {
            eprintln!(
                "`{BACKEND_VAR}` must be `zune-jpeg` or `jpeg-decoder`, got '{}'; exiting",
                v.to_string_lossy()
            );
            process::exit(1);
        }
    };
    log::debug!("decoding JPEG frames with {backend:?}");
    backend
});

pub(super) fn decode(data: &[u8]) -> anyhow::Result<Image> {
    let decoded = match *BACKEND {
        Backend::Zune => decode_zune(data),
        Backend::JpegDecoder => decode_jpeg_decoder(data),
    };
    decoded.context("failed to decode JPEG frame")
}

fn decode_zune(data: &[u8]) -> anyhow::Result<Image> {
    let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(options, data);
    decoder.decode_headers()?;
    match decoder.get_output_colorspace() {
        Some(ColorSpace::RGBA) => {}
        other => bail!("decoder produces {other:?}, not RGBA"),
    }
    let (width, height) = decoder
        .dimensions()
        .ok_or_else(|| anyhow!("JPEG header has no dimensions"))?;
    let len = decoder
        .output_buffer_size()
        .ok_or_else(|| anyhow!("JPEG header has no output size"))?;

    let mut pixels = vec![0; len];
    decoder.decode_into(&mut pixels)?;
    Image::from_raw(Resolution::new(width.into(), height.into()), pixels)
}

fn decode_jpeg_decoder(data: &[u8]) -> anyhow::Result<Image> {
    use jpeg_decoder::PixelFormat;

    let mut decoder = jpeg_decoder::Decoder::new(data);
    let decoded = decoder.decode()?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("JPEG header has no image info"))?;
    let pixels = match info.pixel_format {
        PixelFormat::RGB24 => decoded
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], u8::MAX])
            .collect(),
        PixelFormat::L8 => decoded.iter().flat_map(|&v| [v, v, v, u8::MAX]).collect(),
        other => bail!("unsupported JPEG pixel format {other:?}"),
    };
    Image::from_raw(
        Resolution::new(info.width.into(), info.height.into()),
        pixels,
    )
}
