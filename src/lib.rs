// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Multi-pass 6502 cross-assembler producing C64 PRG images.
//!
//! Source text is tokenized into statement chunks and replayed over
//! repeated passes until the memory image converges. The expression
//! language carries integers, floats, text, lists and small function
//! literals; generator statements expand host functions into further
//! assembly text. See [`assembler::assemble_file`] for the top-level
//! entry point.

pub mod assembler;
pub mod cli;
pub mod core;
