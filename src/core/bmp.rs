// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! BMP image loading for sprite and bitmap data.
//!
//! Accepts uncompressed 8 bit per pixel BMP files whose width is a
//! multiple of 8. Pixel rows are stored bottom up in the file; the
//! loader walks them top down and repacks the image into 24x21 pixel
//! blocks, each padded to 64 bytes, the layout the VIC-II expects for
//! sprites. Within a block every 8 pixels collapse into one byte, any
//! nonzero pixel becomes a set bit.

use std::fmt;
use std::fs;
use std::path::Path;

const FILE_HEADER_SIZE: usize = 14;
const DIB_PREFIX_SIZE: usize = 16;

const BLOCK_WIDTH: i64 = 24;
const BLOCK_HEIGHT: i64 = 21;
const BLOCK_ALIGN: usize = 64;

#[derive(Debug, Clone)]
pub struct BmpError {
    pub message: String,
}

impl fmt::Display for BmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BmpError {}

#[derive(Debug)]
pub struct Image {
    pub width: i64,
    pub height: i64,
    pub data: Vec<u8>,
}

impl Image {
    /// Repack raw 8 bit pixels into sprite blocks. Pixels addressed
    /// outside the image read as 0, which pads images whose size is not
    /// a block multiple.
    fn from_pixels(width: i64, height: i64, pixels: &[u8]) -> Self {
        let mut data = Vec::new();
        let pixel_at = |x: i64, y: i64| -> u8 {
            if x < 0 || y < 0 || x >= width || y >= height {
                return 0;
            }
            // Rows are bottom up in the file.
            let index = (height - 1 - y) * width + x;
            pixels.get(index as usize).copied().unwrap_or(0)
        };

        let mut y = 0;
        while y < height {
            let mut x = 0;
            while x < width {
                for yy in 0..BLOCK_HEIGHT {
                    let mut xx = 0;
                    while xx < BLOCK_WIDTH {
                        let mut byte = 0u8;
                        for bit in 0..8 {
                            if pixel_at(x + xx + bit, y + yy) != 0 {
                                byte |= 0x80 >> bit;
                            }
                        }
                        data.push(byte);
                        xx += 8;
                    }
                }
                while data.len() % BLOCK_ALIGN != 0 {
                    data.push(0);
                }
                x += BLOCK_WIDTH;
            }
            y += BLOCK_HEIGHT;
        }

        Self {
            width,
            height,
            data,
        }
    }
}

pub fn load(path: &Path) -> Result<Image, BmpError> {
    let bytes = fs::read(path).map_err(|err| BmpError {
        message: format!("Failed to open \"{}\": {err}", path.display()),
    })?;
    parse(&bytes).map_err(|message| BmpError {
        message: format!("{message}: \"{}\"", path.display()),
    })
}

fn parse(bytes: &[u8]) -> Result<Image, String> {
    if bytes.len() < FILE_HEADER_SIZE + DIB_PREFIX_SIZE || &bytes[0..2] != b"BM" {
        return Err("Not a valid bmp file".to_string());
    }

    let dword = |offset: usize| {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    };
    let data_offset = dword(10) as usize;
    let width = dword(18) as i32 as i64;
    let height = dword(22) as i32 as i64;
    let bits_per_pixel = u16::from_le_bytes([bytes[28], bytes[29]]);

    if bits_per_pixel != 8 {
        return Err(format!(
            "Image bits per pixel {bits_per_pixel} not supported"
        ));
    }
    if width % 8 != 0 {
        return Err(format!("Image width {width} not a multiple of 8"));
    }
    if data_offset > bytes.len() {
        return Err("Not a valid bmp file".to_string());
    }

    Ok(Image::from_pixels(
        width,
        height.max(0),
        &bytes[data_offset..],
    ))
}
