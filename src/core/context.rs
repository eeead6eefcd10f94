// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Per-pass assembly state.
//!
//! A [`Context`] is created fresh for every pass and carries the memory
//! image, label set, diagnostics and the read pointer stack. The symbol
//! table is moved in at the start of a pass and taken back afterwards so
//! definitions survive into the next pass, which is what lets forward
//! references resolve.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::core::eval::Value;
use crate::core::petscii::Encoding;

/// Reserved symbol holding the current memory address.
pub const CURRENT_ADDRESS: &str = "_";

/// Position in a token stream, indexed by statement chunk. For source
/// files the chunk index equals the zero-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPointer {
    pub stream: String,
    pub index: usize,
}

impl ReadPointer {
    pub fn new(stream: impl Into<String>, index: usize) -> Self {
        Self {
            stream: stream.into(),
            index,
        }
    }
}

/// Active `.repeat` block. `resume` points at the chunk after the
/// `.repeat` statement itself; `.endr` jumps back there until `count`
/// iterations have run.
#[derive(Debug, Clone)]
pub struct RepeatFrame {
    pub iterator: String,
    pub count: i64,
    pub resume: ReadPointer,
}

pub struct Context {
    pub symbols: HashMap<String, Value>,
    /// Names defined as labels this pass, for duplicate detection and
    /// the memory report.
    pub labels: HashSet<String>,
    pub memory: BTreeMap<u16, u8>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub repeats: Vec<RepeatFrame>,
    pub encoding: Encoding,
    /// Next free zero page address; $0 and $1 are the CPU port.
    pub zp_address: i64,
    /// Directory of the top-level source file, base for imports and
    /// binary includes.
    pub path: PathBuf,
    pointers: Vec<ReadPointer>,
}

impl Context {
    pub fn new(mut symbols: HashMap<String, Value>, encoding: Encoding) -> Self {
        symbols.insert("pi".to_string(), Value::Float(std::f64::consts::PI));
        symbols.insert("e".to_string(), Value::Float(std::f64::consts::E));
        symbols.insert("ENCODING_SCREEN_UPPER".to_string(), Value::Int(0));
        symbols.insert("ENCODING_SCREEN_MIXED".to_string(), Value::Int(1));
        symbols.insert("ENCODING_PETSCII_UPPER".to_string(), Value::Int(2));
        symbols.insert("ENCODING_PETSCII_MIXED".to_string(), Value::Int(3));
        Self {
            symbols,
            labels: HashSet::new(),
            memory: BTreeMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            repeats: Vec::new(),
            encoding,
            zp_address: 2,
            path: PathBuf::new(),
            pointers: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read pointer stack

    pub fn read_pointer(&self) -> Option<&ReadPointer> {
        self.pointers.last()
    }

    pub fn push_read_pointer(&mut self, pointer: ReadPointer) {
        self.pointers.push(pointer);
    }

    pub fn pop_read_pointer(&mut self) -> Option<ReadPointer> {
        self.pointers.pop()
    }

    /// Replace the top of the stack, the transfer used by `.endr`.
    pub fn jump_read_pointer(&mut self, pointer: ReadPointer) {
        if let Some(top) = self.pointers.last_mut() {
            *top = pointer;
        }
    }

    pub fn advance_read_pointer(&mut self) {
        if let Some(top) = self.pointers.last_mut() {
            top.index += 1;
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics

    fn position_prefix(&self) -> String {
        match self.read_pointer() {
            Some(pointer) => format!("{}:{} ", pointer.stream, pointer.index + 1),
            None => String::new(),
        }
    }

    pub fn report_warning(&mut self, text: impl AsRef<str>) {
        let prefix = self.position_prefix();
        self.warnings.push(format!("{prefix}warning: {}", text.as_ref()));
    }

    pub fn report_error(&mut self, text: impl AsRef<str>) {
        let prefix = self.position_prefix();
        self.errors.push(format!("{prefix}error: {}", text.as_ref()));
    }

    // ------------------------------------------------------------------
    // Memory

    /// The current memory address, the value of the reserved symbol `_`.
    pub fn location(&self) -> i64 {
        match self.symbols.get(CURRENT_ADDRESS) {
            Some(Value::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn set_location(&mut self, address: i64) {
        self.symbols
            .insert(CURRENT_ADDRESS.to_string(), Value::Int(address));
    }

    /// Store one byte at the current address and advance. Overwriting an
    /// already emitted byte keeps the new value and warns; an address
    /// outside `$0000..=$ffff` reports an error and emits nothing. The
    /// address advances in every case.
    pub fn store(&mut self, value: u8) {
        let location = self.location();
        if (0..=0xffff).contains(&location) {
            let address = location as u16;
            if let Some(old) = self.memory.get(&address).copied() {
                self.report_warning(format!(
                    "${address:04x} is overwritten (${old:02x} to ${value:02x})"
                ));
            }
            self.memory.insert(address, value);
        } else {
            self.report_error(format!(
                "Destination memory address out of range: ${location:x}"
            ));
        }
        self.set_location(location + 1);
    }

    // ------------------------------------------------------------------
    // Reporting

    /// Memory range, label listing and a page occupancy map.
    pub fn memory_use_report(&self) -> String {
        let mut out = String::new();

        let range = match (self.memory.keys().next(), self.memory.keys().next_back()) {
            (Some(&first), Some(&last)) => {
                let total = last as u32 - first as u32 + 1;
                format!("${first:04x}-${last:04x} ({total} bytes)")
            }
            _ => "None".to_string(),
        };
        let _ = writeln!(out, "Memory used: {range}");

        let mut listing: Vec<(i64, &str)> = self
            .labels
            .iter()
            .filter(|label| !label.starts_with('_'))
            .filter_map(|label| match self.symbols.get(label) {
                Some(Value::Int(address)) => Some((*address, label.as_str())),
                _ => None,
            })
            .collect();
        listing.sort();
        for (address, label) in listing {
            let _ = writeln!(out, "${address:04x}: {label}");
        }

        let mut pages = [0u32; 256];
        for address in self.memory.keys() {
            pages[(address >> 8) as usize] += 1;
        }
        let full = pages.iter().filter(|&&used| used >= 256).count();
        let partial = pages.iter().filter(|&&used| used > 0 && used < 256).count();
        let _ = writeln!(out, "Pages used: {full} full, {partial} partial");

        for row in 0..16 {
            let _ = write!(out, "${:04x}: ", row * 16 * 256);
            for column in 0..16 {
                out.push(match pages[row * 16 + column] {
                    0 => '░',
                    1..=255 => '▒',
                    _ => '▓',
                });
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(Default::default(), Default::default())
    }

    #[test]
    fn store_emits_and_advances() {
        let mut ctx = ctx();
        ctx.set_location(0x1000);
        ctx.store(0x01);
        ctx.store(0x02);
        assert_eq!(ctx.location(), 0x1002);
        assert_eq!(ctx.memory.get(&0x1000), Some(&0x01));
        assert_eq!(ctx.memory.get(&0x1001), Some(&0x02));
        assert!(ctx.warnings.is_empty());
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn store_overwrite_keeps_new_value_and_warns() {
        let mut ctx = ctx();
        ctx.set_location(0x2000);
        ctx.store(0x11);
        ctx.set_location(0x2000);
        ctx.store(0x22);
        assert_eq!(ctx.memory.get(&0x2000), Some(&0x22));
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].contains("$2000 is overwritten ($11 to $22)"));
    }

    #[test]
    fn store_out_of_range_reports_error_and_still_advances() {
        let mut ctx = ctx();
        ctx.set_location(0x10000);
        ctx.store(0xff);
        assert!(ctx.memory.is_empty());
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.location(), 0x10001);
    }

    #[test]
    fn diagnostics_carry_stream_position() {
        let mut ctx = ctx();
        ctx.push_read_pointer(ReadPointer::new("main.asm", 4));
        ctx.report_error("boom");
        assert_eq!(ctx.errors[0], "main.asm:5 error: boom");
    }

    #[test]
    fn read_pointer_stack_operations() {
        let mut ctx = ctx();
        ctx.push_read_pointer(ReadPointer::new("a", 0));
        ctx.push_read_pointer(ReadPointer::new("b", 3));
        ctx.advance_read_pointer();
        assert_eq!(ctx.read_pointer(), Some(&ReadPointer::new("b", 4)));
        ctx.jump_read_pointer(ReadPointer::new("b", 1));
        assert_eq!(ctx.read_pointer(), Some(&ReadPointer::new("b", 1)));
        assert_eq!(ctx.pop_read_pointer(), Some(ReadPointer::new("b", 1)));
        assert_eq!(ctx.read_pointer(), Some(&ReadPointer::new("a", 0)));
    }

    #[test]
    fn memory_report_lists_labels_and_pages() {
        let mut ctx = ctx();
        ctx.set_location(0x1000);
        ctx.store(1);
        ctx.symbols.insert("start".to_string(), Value::Int(0x1000));
        ctx.labels.insert("start".to_string());
        ctx.symbols.insert("_local".to_string(), Value::Int(0x1001));
        ctx.labels.insert("_local".to_string());
        let report = ctx.memory_use_report();
        assert!(report.contains("Memory used: $1000-$1000 (1 bytes)"));
        assert!(report.contains("$1000: start"));
        assert!(!report.contains("_local"));
        assert!(report.contains("Pages used: 0 full, 1 partial"));
    }
}
