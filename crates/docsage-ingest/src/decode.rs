//! Image XObject decoding.
//!
//! JPEG streams pass through untouched. Raw 8-bit Gray/RGB/CMYK samples
//! (unfiltered or FlateDecode) are re-encoded as PNG. Other filters
//! (JPXDecode, CCITT, JBIG2, ...) are reported as decode errors.

use std::io::{Cursor, Read};

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Object, Stream};

use docsage_core::{Error, Result};

/// Images narrower or shorter than this (in pixels) are treated as icons.
pub const MIN_IMAGE_DIMENSION: u32 = 50;

/// An encoded image ready for a vision model.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn meets_minimum_size(&self) -> bool {
        self.width >= MIN_IMAGE_DIMENSION && self.height >= MIN_IMAGE_DIMENSION
    }
}

/// Decode the stream of an image XObject.
pub fn decode_pdf_image(stream: &Stream) -> Result<DecodedImage> {
    let filters = filter_names(&stream.dict);
    match filters.as_slice() {
        [] => decode_raw(&stream.dict, &stream.content),
        [f] if f == "FlateDecode" => decode_raw(&stream.dict, &inflate(stream)?),
        [f] if f == "DCTDecode" => decode_jpeg(&stream.content),
        other => Err(Error::ImageDecode(format!(
            "unsupported image filter chain [{}]",
            other.join(", ")
        ))),
    }
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Zlib-inflate a FlateDecode stream and undo any PNG predictor.
fn inflate(stream: &Stream) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    ZlibDecoder::new(stream.content.as_slice())
        .read_to_end(&mut data)
        .map_err(|e| Error::ImageDecode(format!("FlateDecode failed: {}", e)))?;

    match decode_parms(&stream.dict) {
        Some(parms) => undo_predictor(parms, data),
        None => Ok(data),
    }
}

fn decode_parms(dict: &Dictionary) -> Option<&Dictionary> {
    match dict.get(b"DecodeParms").ok()? {
        Object::Dictionary(parms) => Some(parms),
        Object::Array(items) => items.first().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

fn undo_predictor(parms: &Dictionary, data: Vec<u8>) -> Result<Vec<u8>> {
    let int = |key: &[u8], default: i64| parms.get(key).and_then(Object::as_i64).unwrap_or(default);

    match int(b"Predictor", 1) {
        1 => Ok(data),
        p if p >= 10 => {
            let colors = int(b"Colors", 1);
            let bpc = int(b"BitsPerComponent", 8);
            let columns = int(b"Columns", 1);
            if colors < 1 || columns < 1 || bpc != 8 {
                return Err(Error::ImageDecode(format!(
                    "unsupported predictor parameters: Colors {}, Columns {}, BitsPerComponent {}",
                    colors, columns, bpc
                )));
            }
            png_unfilter(&data, colors as usize, (colors * columns) as usize)
        }
        p => Err(Error::ImageDecode(format!("predictor {} not supported", p))),
    }
}

/// Reverse PNG row filtering: each row is a filter-type byte followed by
/// `row_len` filtered bytes. A trailing partial row is dropped.
fn png_unfilter(data: &[u8], bpp: usize, row_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / (row_len + 1) * row_len);
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks_exact(row_len + 1) {
        let filter = chunk[0];
        if filter > 4 {
            return Err(Error::ImageDecode(format!("invalid PNG row filter {}", filter)));
        }
        let mut row = chunk[1..].to_vec();
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let up_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let predicted = match filter {
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            row[i] = row[i].wrapping_add(predicted);
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

pub(crate) fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn decode_jpeg(data: &[u8]) -> Result<DecodedImage> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| Error::ImageDecode(format!("invalid JPEG: {}", e)))?;
    let (width, height) = img.dimensions();
    Ok(DecodedImage {
        bytes: data.to_vec(),
        mime_type: "image/jpeg",
        width,
        height,
    })
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            Error::ImageDecode(format!("missing or invalid {}", String::from_utf8_lossy(key)))
        })
}

/// Raw samples: the component count is inferred from the buffer length.
fn decode_raw(dict: &Dictionary, data: &[u8]) -> Result<DecodedImage> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bpc = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bpc != 8 {
        return Err(Error::ImageDecode(format!("{} bits per component not supported", bpc)));
    }

    let pixels = width as usize * height as usize;
    let img = match data.len() / pixels {
        1 => GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8),
        n if n >= 4 => {
            let rgb = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - p[3] as u32;
                    [p[0], p[1], p[2]].map(|c| ((255 - c as u32) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
    .ok_or_else(|| {
        Error::ImageDecode(format!(
            "{} bytes do not fit a {}x{} image",
            data.len(),
            width,
            height
        ))
    })?;

    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::ImageDecode(format!("PNG encode failed: {}", e)))?;

    Ok(DecodedImage {
        bytes: png,
        mime_type: "image/png",
        width,
        height,
    })
}
