// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Core building blocks: lexing, expression evaluation, per-pass state,
//! the 6502 instruction set, directives and file format loaders.

pub mod bmp;
pub mod context;
pub mod cpu;
pub mod directives;
pub mod eval;
pub mod extensions;
pub mod petscii;
pub mod sid;
pub mod tokenizer;
