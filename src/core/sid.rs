// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! PSID music file loading.
//!
//! The PSID header is big endian: a 4 byte magic, seven 16 bit fields
//! (version, data offset, load, init and play addresses, song count,
//! start song), a 32 bit speed mask and three 32 byte credit strings,
//! 118 bytes in total. A zero load address means the first two data
//! bytes hold the real address, little endian.

use std::fmt;
use std::fs;
use std::path::Path;

const HEADER_SIZE: usize = 118;
const MAGIC: &[u8; 4] = b"PSID";

#[derive(Debug, Clone)]
pub struct SidError {
    pub message: String,
}

impl fmt::Display for SidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SidError {}

#[derive(Debug)]
pub struct Music {
    pub load_address: u16,
    pub init_address: u16,
    pub play_address: u16,
    pub data: Vec<u8>,
}

pub fn load(path: &Path) -> Result<Music, SidError> {
    let bytes = fs::read(path).map_err(|err| SidError {
        message: format!("Failed to open \"{}\": {err}", path.display()),
    })?;
    parse(&bytes).map_err(|message| SidError {
        message: format!("{message}: \"{}\"", path.display()),
    })
}

fn parse(bytes: &[u8]) -> Result<Music, String> {
    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
        return Err("Not a valid sid file".to_string());
    }

    let word = |offset: usize| u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
    let data_offset = word(6) as usize;
    let mut load_address = word(8);
    let init_address = word(10);
    let play_address = word(12);

    if data_offset > bytes.len() {
        return Err("Not a valid sid file".to_string());
    }
    let mut data = bytes[data_offset..].to_vec();
    if load_address == 0 && data.len() >= 2 {
        load_address = u16::from_le_bytes([data[0], data[1]]);
        data.drain(0..2);
    }

    Ok(Music {
        load_address,
        init_address,
        play_address,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(load: u16, init: u16, play: u16, data_offset: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&2u16.to_be_bytes()); // version
        bytes.extend_from_slice(&data_offset.to_be_bytes());
        bytes.extend_from_slice(&load.to_be_bytes());
        bytes.extend_from_slice(&init.to_be_bytes());
        bytes.extend_from_slice(&play.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes()); // songs
        bytes.extend_from_slice(&1u16.to_be_bytes()); // start song
        bytes.extend_from_slice(&0u32.to_be_bytes()); // speed
        bytes.extend_from_slice(&[0; 96]); // name, author, copyright
        assert_eq!(bytes.len(), HEADER_SIZE);
        bytes
    }

    #[test]
    fn parses_header_addresses() {
        let mut bytes = header(0x1000, 0x1000, 0x1003, HEADER_SIZE as u16);
        bytes.extend_from_slice(&[0xa9, 0x00, 0x60]);
        let music = parse(&bytes).unwrap();
        assert_eq!(music.load_address, 0x1000);
        assert_eq!(music.init_address, 0x1000);
        assert_eq!(music.play_address, 0x1003);
        assert_eq!(music.data, vec![0xa9, 0x00, 0x60]);
    }

    #[test]
    fn zero_load_address_comes_from_data() {
        let mut bytes = header(0, 0x2000, 0x2003, HEADER_SIZE as u16);
        bytes.extend_from_slice(&[0x00, 0x20, 0xea]);
        let music = parse(&bytes).unwrap();
        assert_eq!(music.load_address, 0x2000);
        assert_eq!(music.data, vec![0xea]);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = header(0x1000, 0x1000, 0x1003, HEADER_SIZE as u16);
        bytes[0..4].copy_from_slice(b"RSID");
        assert!(parse(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_file() {
        assert!(parse(b"PSID").is_err());
    }
}
