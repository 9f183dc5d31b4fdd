//! Codec for the MRI page container served by the mangarock CDN.
//!
//! An MRI file is a WebP RIFF stream with its first 15 bytes (`RIFF`, the little endian RIFF
//! size and `WEBPVP8`) cut off and every remaining byte XOR-ed with [XOR_KEY]. The first byte
//! left is therefore the obfuscated last character of the VP8 chunk tag.

use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

pub const XOR_KEY: u8 = 101;

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WEBP_VP8: &[u8; 7] = b"WEBPVP8";

/// Number of leading WebP bytes an MRI file does not carry
pub const STRIPPED_HEADER_LEN: usize = RIFF_MAGIC.len() + 4 + WEBP_VP8.len();

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("container is empty")]
    Empty,
    #[error("unexpected chunk tag {0:#04x}")]
    UnknownChunk(u8),
    #[error("container of {0} bytes does not fit a RIFF stream")]
    TooLarge(usize),
    #[error("not a VP8 webp stream")]
    NotWebp,
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Restores the WebP stream hidden in an MRI container
pub fn mri_to_webp(data: &[u8]) -> Result<Vec<u8>, ContainerError> {
    let Some(&first) = data.first() else {
        return Err(ContainerError::Empty);
    };

    let tag = first ^ XOR_KEY;
    if !matches!(tag, b' ' | b'L' | b'X') {
        return Err(ContainerError::UnknownChunk(tag));
    }

    // RIFF size counts everything after the size field: "WEBPVP8" plus the payload
    let riff_size = data
        .len()
        .checked_add(WEBP_VP8.len())
        .and_then(|size| u32::try_from(size).ok())
        .ok_or(ContainerError::TooLarge(data.len()))?;

    let mut webp = Vec::with_capacity(STRIPPED_HEADER_LEN + data.len());
    webp.extend_from_slice(RIFF_MAGIC);
    webp.extend_from_slice(&riff_size.to_le_bytes());
    webp.extend_from_slice(WEBP_VP8);
    webp.extend(data.iter().map(|byte| byte ^ XOR_KEY));

    Ok(webp)
}

/// Inverse of [mri_to_webp]
pub fn webp_to_mri(webp: &[u8]) -> Result<Vec<u8>, ContainerError> {
    if webp.len() <= STRIPPED_HEADER_LEN
        || &webp[..4] != RIFF_MAGIC
        || &webp[8..STRIPPED_HEADER_LEN] != WEBP_VP8
    {
        return Err(ContainerError::NotWebp);
    }

    Ok(webp[STRIPPED_HEADER_LEN..]
        .iter()
        .map(|byte| byte ^ XOR_KEY)
        .collect())
}

/// Decodes an MRI container into a raster
pub fn decode(data: &[u8]) -> Result<DynamicImage, ContainerError> {
    let webp = mri_to_webp(data)?;

    Ok(image::load_from_memory_with_format(&webp, ImageFormat::WebP)?)
}

/// Packs `image` into an MRI container holding a lossless WebP stream
pub fn encode(image: &DynamicImage) -> Result<Vec<u8>, ContainerError> {
    let mut webp = Vec::new();

    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => {
            image.write_with_encoder(WebPEncoder::new_lossless(&mut webp))?
        }
        _ => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut webp))?,
    }

    webp_to_mri(&webp)
}
