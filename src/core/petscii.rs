// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! C64 text encodings.
//!
//! Maps between Unicode characters and the byte values the machine uses
//! for them, either as screen codes (video matrix) or PETSCII (CHROUT,
//! keyboard). Each comes in an uppercase-only and a mixed-case variant.
//! See <https://en.wikipedia.org/wiki/PETSCII>.

/// Active text encoding, selected with the `.encoding` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    ScreenUpper,
    ScreenMixed,
    PetsciiUpper,
    PetsciiMixed,
}

impl Encoding {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Encoding::ScreenUpper),
            1 => Some(Encoding::ScreenMixed),
            2 => Some(Encoding::PetsciiUpper),
            3 => Some(Encoding::PetsciiMixed),
            _ => None,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            Encoding::ScreenUpper => 0,
            Encoding::ScreenMixed => 1,
            Encoding::PetsciiUpper => 2,
            Encoding::PetsciiMixed => 3,
        }
    }

    fn table(self) -> &'static [(u8, char)] {
        match self {
            Encoding::ScreenUpper => SCREEN_UPPER,
            Encoding::ScreenMixed => SCREEN_MIXED,
            Encoding::PetsciiUpper => PETSCII_UPPER,
            Encoding::PetsciiMixed => PETSCII_MIXED,
        }
    }
}

/// The character displayed or printed for a byte value, if any.
pub fn chr(encoding: Encoding, value: i64) -> Option<char> {
    let value = u8::try_from(value).ok()?;
    encoding
        .table()
        .iter()
        .find(|(code, _)| *code == value)
        .map(|(_, c)| *c)
}

/// The byte value for a character, if the encoding has one. When a glyph
/// appears at more than one code (mixed-case tables) the highest code
/// wins.
pub fn ord(encoding: Encoding, character: char) -> Option<u8> {
    encoding
        .table()
        .iter()
        .filter(|(_, c)| *c == character)
        .map(|(code, _)| *code)
        .last()
}

// Shared middle of all four tables, screen codes 0x1b..=0x3f.
const SCREEN_SYMBOLS: [(u8, char); 37] = [
    (0x1b, '['), (0x1c, '£'), (0x1d, ']'), (0x1e, '↑'), (0x1f, '←'),
    (0x20, ' '), (0x21, '!'), (0x22, '"'), (0x23, '#'), (0x24, '$'),
    (0x25, '%'), (0x26, '&'), (0x27, '´'), (0x28, '('), (0x29, ')'),
    (0x2a, '*'), (0x2b, '+'), (0x2c, ','), (0x2d, '-'), (0x2e, '.'),
    (0x2f, '/'), (0x30, '0'), (0x31, '1'), (0x32, '2'), (0x33, '3'),
    (0x34, '4'), (0x35, '5'), (0x36, '6'), (0x37, '7'), (0x38, '8'),
    (0x39, '9'), (0x3a, ':'), (0x3b, ';'), (0x3c, '<'), (0x3d, '='),
    (0x3e, '>'), (0x3f, '?'),
];

const SCREEN_UPPER: &[(u8, char)] = &{
    let mut table = [(0u8, '\0'); 64];
    let mut i = 0;
    table[i] = (0x00, '@');
    i += 1;
    let mut c = 0u8;
    while c < 26 {
        table[i] = (0x01 + c, (b'A' + c) as char);
        i += 1;
        c += 1;
    }
    let symbols = SCREEN_SYMBOLS;
    let mut s = 0;
    while s < symbols.len() {
        table[i] = symbols[s];
        i += 1;
        s += 1;
    }
    table
};

const SCREEN_MIXED: &[(u8, char)] = &{
    let mut table = [(0u8, '\0'); 91];
    let mut i = 0;
    table[i] = (0x00, '@');
    i += 1;
    let mut c = 0u8;
    while c < 26 {
        table[i] = (0x01 + c, (b'a' + c) as char);
        i += 1;
        c += 1;
    }
    let symbols = SCREEN_SYMBOLS;
    let mut s = 0;
    while s < symbols.len() {
        table[i] = symbols[s];
        i += 1;
        s += 1;
    }
    table[i] = (0x40, '―');
    i += 1;
    c = 0;
    while c < 26 {
        table[i] = (0x41 + c, (b'A' + c) as char);
        i += 1;
        c += 1;
    }
    table
};

const PETSCII_UPPER: &[(u8, char)] = &{
    let mut table = [(0u8, '\0'); 64];
    let mut i = 0;
    let symbols = SCREEN_SYMBOLS;
    // PETSCII places the symbols at 0x20..=0x3f as well, minus the
    // bracket group which moves above the letters.
    let mut s = 5;
    while s < symbols.len() {
        table[i] = symbols[s];
        i += 1;
        s += 1;
    }
    table[i] = (0x40, '@');
    i += 1;
    let mut c = 0u8;
    while c < 26 {
        table[i] = (0x41 + c, (b'A' + c) as char);
        i += 1;
        c += 1;
    }
    table[i] = (0x5b, '[');
    table[i + 1] = (0x5c, '£');
    table[i + 2] = (0x5d, ']');
    table[i + 3] = (0x5e, '↑');
    table[i + 4] = (0x5f, '←');
    table
};

const PETSCII_MIXED: &[(u8, char)] = &{
    let mut table = [(0u8, '\0'); 91];
    let mut i = 0;
    let symbols = SCREEN_SYMBOLS;
    let mut s = 5;
    while s < symbols.len() {
        table[i] = symbols[s];
        i += 1;
        s += 1;
    }
    table[i] = (0x40, '@');
    i += 1;
    let mut c = 0u8;
    while c < 26 {
        table[i] = (0x41 + c, (b'a' + c) as char);
        i += 1;
        c += 1;
    }
    table[i] = (0x5b, '[');
    table[i + 1] = (0x5c, '£');
    table[i + 2] = (0x5d, ']');
    table[i + 3] = (0x5e, '↑');
    table[i + 4] = (0x5f, '←');
    i += 5;
    table[i] = (0x60, '―');
    i += 1;
    c = 0;
    while c < 26 {
        table[i] = (0x61 + c, (b'A' + c) as char);
        i += 1;
        c += 1;
    }
    table
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chr_capital_a() {
        assert_eq!(chr(Encoding::ScreenUpper, 1), Some('A'));
        assert_eq!(chr(Encoding::ScreenMixed, 65), Some('A'));
        assert_eq!(chr(Encoding::PetsciiUpper, 65), Some('A'));
        assert_eq!(chr(Encoding::PetsciiMixed, 97), Some('A'));
    }

    #[test]
    fn chr_lowercase_a() {
        assert_eq!(chr(Encoding::ScreenMixed, 1), Some('a'));
        assert_eq!(chr(Encoding::PetsciiMixed, 65), Some('a'));
    }

    #[test]
    fn ord_capital_a() {
        assert_eq!(ord(Encoding::ScreenUpper, 'A'), Some(1));
        assert_eq!(ord(Encoding::ScreenMixed, 'A'), Some(65));
        assert_eq!(ord(Encoding::PetsciiUpper, 'A'), Some(65));
        assert_eq!(ord(Encoding::PetsciiMixed, 'A'), Some(97));
    }

    #[test]
    fn ord_lowercase_a() {
        assert_eq!(ord(Encoding::ScreenUpper, 'a'), None);
        assert_eq!(ord(Encoding::ScreenMixed, 'a'), Some(1));
        assert_eq!(ord(Encoding::PetsciiUpper, 'a'), None);
        assert_eq!(ord(Encoding::PetsciiMixed, 'a'), Some(65));
    }

    #[test]
    fn unknown_codes_map_to_none() {
        assert_eq!(chr(Encoding::ScreenUpper, 0x40), None);
        assert_eq!(chr(Encoding::PetsciiUpper, 31), None);
        assert_eq!(ord(Encoding::ScreenUpper, 'é'), None);
    }

    #[test]
    fn space_round_trips_everywhere() {
        for encoding in [
            Encoding::ScreenUpper,
            Encoding::ScreenMixed,
            Encoding::PetsciiUpper,
            Encoding::PetsciiMixed,
        ] {
            assert_eq!(ord(encoding, ' '), Some(0x20));
            assert_eq!(chr(encoding, 0x20), Some(' '));
        }
    }
}
