// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The multi-pass driver.
//!
//! Every pass replays all token streams against a fresh [`Context`].
//! The symbol table survives between passes, so a name that was defined
//! late in one pass resolves early in the next. Assembly converges when
//! a pass produces the same memory image as the one before it with no
//! errors; ten passes without convergence is an error of its own.
//!
//! Token streams are chunked once per run and cached, keyed by stream
//! name. Generator statements re-tokenize on every encounter since their
//! output may change as symbols settle.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::core::context::{Context, ReadPointer};
use crate::core::cpu;
use crate::core::directives::{self, MediaCache};
use crate::core::eval::{self, format_value, Value};
use crate::core::extensions;
use crate::core::tokenizer::{chunk_split, join_tokens, tokenize, tokenize_source, Chunk, LexError, Token};

pub const MAX_PASSES: u32 = 10;
pub const DEFAULT_ORIGIN: i64 = 0x1000;

/// Result of an assembly run.
pub struct Assembly {
    pub memory: BTreeMap<u16, u8>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub passes: u32,
    pub memory_report: String,
}

impl Assembly {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Assembler {
    chunks: HashMap<String, Vec<Chunk>>,
    lex_errors: HashMap<String, Vec<LexError>>,
    media: MediaCache,
    symbols: HashMap<String, Value>,
    path: PathBuf,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        let mut symbols = HashMap::new();
        let names: Vec<&str> = extensions::builtin()
            .iter()
            .map(|extension| {
                extension.install(&mut symbols);
                extension.name
            })
            .collect();
        log::info!("Extensions: {}", names.join(", "));

        Self {
            chunks: HashMap::new(),
            lex_errors: HashMap::new(),
            media: MediaCache::default(),
            symbols,
            path: PathBuf::new(),
        }
    }

    /// Base directory for `.import`, `.binary` and the other file
    /// directives.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Preload a named token stream, bypassing the filesystem.
    pub fn add_stream(&mut self, name: &str, source: &str) {
        let (tokens, errors) = tokenize_source(source);
        self.chunks.insert(name.to_string(), chunk_split(&tokens));
        self.lex_errors.insert(name.to_string(), errors);
    }

    /// Run passes over the named entry stream until the memory image
    /// settles.
    pub fn run(&mut self, entry: &str) -> Assembly {
        let mut last_memory = BTreeMap::new();

        for pass in 1..=MAX_PASSES {
            log::debug!("Pass {pass}");

            self.symbols
                .insert("_".to_string(), Value::Int(DEFAULT_ORIGIN));
            let mut ctx = Context::new(std::mem::take(&mut self.symbols), Default::default());
            ctx.path = self.path.clone();
            ctx.push_read_pointer(ReadPointer::new(entry, 0));

            let mut visited: HashSet<String> = HashSet::new();
            while let Some(pointer) = ctx.read_pointer().cloned() {
                if !self.ensure_stream(&pointer.stream, &mut ctx) {
                    ctx.pop_read_pointer();
                    continue;
                }
                if visited.insert(pointer.stream.clone()) {
                    self.report_lex_errors(&pointer.stream, &mut ctx);
                }

                let chunk = match self.chunks[&pointer.stream].get(pointer.index) {
                    Some(chunk) => chunk.clone(),
                    None => {
                        ctx.pop_read_pointer();
                        continue;
                    }
                };
                if self.assemble_chunk(&chunk, &mut ctx) {
                    ctx.advance_read_pointer();
                }
            }

            let converged = ctx.errors.is_empty() && ctx.memory == last_memory;
            if !converged && pass == MAX_PASSES {
                ctx.report_error(format!(
                    "Assembly did not converge after {MAX_PASSES} passes"
                ));
            }
            let memory_report = ctx.memory_use_report();
            self.symbols = std::mem::take(&mut ctx.symbols);

            if converged || pass == MAX_PASSES {
                return Assembly {
                    memory: ctx.memory,
                    warnings: ctx.warnings,
                    errors: ctx.errors,
                    passes: pass,
                    memory_report,
                };
            }
            last_memory = ctx.memory;
        }
        unreachable!("pass loop always returns")
    }

    /// Load and chunk a stream from disk on first use. Returns false if
    /// the stream cannot be read.
    fn ensure_stream(&mut self, stream: &str, ctx: &mut Context) -> bool {
        if self.chunks.contains_key(stream) {
            return true;
        }
        match fs::read_to_string(stream) {
            Ok(source) => {
                log::info!("Loading: {stream}");
                self.add_stream(stream, &source);
                true
            }
            Err(err) => {
                ctx.report_error(format!("Failed to open \"{stream}\": {err}"));
                false
            }
        }
    }

    fn report_lex_errors(&self, stream: &str, ctx: &mut Context) {
        if let Some(errors) = self.lex_errors.get(stream) {
            for error in errors {
                ctx.errors
                    .push(format!("{stream}:{} error: {}", error.line, error.message));
            }
        }
    }

    /// Classify and handle one statement. Returns whether the read
    /// pointer should advance.
    fn assemble_chunk(&mut self, chunk: &[Token], ctx: &mut Context) -> bool {
        let mut rest = chunk;

        if rest.len() >= 2 && rest[1].text == ":" {
            let label = rest[0].text.clone();
            if ctx.labels.contains(&label) {
                ctx.report_error(format!("Label was already defined: \"{label}\""));
            }
            let location = ctx.location();
            ctx.symbols.insert(label.clone(), Value::Int(location));
            ctx.labels.insert(label);
            rest = &rest[2..];
        }

        if !rest.is_empty() && cpu::is_mnemonic(&rest[0].text) {
            let operand = join_tokens(&rest[1..]);
            cpu::assemble_instruction(&rest[0].text, &operand, ctx);
        } else if rest.len() >= 3 && rest[1].text == "=" {
            let symbol = rest[0].text.clone();
            let expression = join_tokens(&rest[2..]);
            if let Some(value) = eval::expression(&expression, ctx) {
                ctx.symbols.insert(symbol, value);
            }
        } else if rest.len() >= 2 && rest[0].text == "." {
            return directives::assemble_directive(rest, ctx, &mut self.media);
        } else if rest.len() >= 2 && rest[0].text == "@" {
            return self.assemble_generator(rest, ctx);
        } else if !rest.is_empty() {
            ctx.report_error("Invalid syntax");
        }
        true
    }

    /// `@expr` evaluates to assembly text that is tokenized into a
    /// synthetic stream and pushed onto the read pointer stack.
    fn assemble_generator(&mut self, chunk: &[Token], ctx: &mut Context) -> bool {
        let expression = join_tokens(&chunk[1..]);
        let value = eval::expression(&expression, ctx);

        ctx.advance_read_pointer();
        let Some(pointer) = ctx.read_pointer().cloned() else {
            return false;
        };

        match value {
            Some(Value::Str(generated)) => {
                let id = format!("{}:{} @{}", pointer.stream, pointer.index, expression);
                let (tokens, errors) = tokenize(&generated);
                for error in &errors {
                    ctx.errors
                        .push(format!("{id}:{} error: {}", error.line, error.message));
                }
                self.chunks.insert(id.clone(), chunk_split(&tokens));
                ctx.push_read_pointer(ReadPointer::new(id, 0));
            }
            Some(other) => ctx.report_error(format!(
                "Expected text instead of: \"{}\"",
                format_value(&other)
            )),
            None => {}
        }
        false
    }
}

/// Assemble a single in-memory source, the entry point used by tests.
pub fn assemble_source(name: &str, source: &str) -> Assembly {
    let mut assembler = Assembler::new();
    assembler.add_stream(name, source);
    assembler.run(name)
}

/// Assemble a source file from disk.
pub fn assemble_file(input: &Path) -> Assembly {
    let mut assembler = Assembler::new();
    if let Some(parent) = input.parent() {
        assembler.set_path(parent);
    }
    assembler.run(&input.to_string_lossy())
}

/// The PRG image: a little endian load address followed by the memory
/// content from the lowest to the highest used address, gaps filled with
/// zero.
pub fn prg_image(memory: &BTreeMap<u16, u8>) -> Vec<u8> {
    let start = memory
        .keys()
        .next()
        .copied()
        .unwrap_or(DEFAULT_ORIGIN as u16);
    let mut image = vec![(start & 0xff) as u8, (start >> 8) as u8];

    if let (Some(&first), Some(&last)) = (memory.keys().next(), memory.keys().next_back()) {
        for address in first..=last {
            image.push(memory.get(&address).copied().unwrap_or(0));
        }
    }
    image
}

pub fn save_prg(memory: &BTreeMap<u16, u8>, output: &Path) -> std::io::Result<()> {
    let mut file = fs::File::create(output)?;
    file.write_all(&prg_image(memory))
}

#[cfg(test)]
mod tests;

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn instructions_assemble_in_sequence() {
        let result = assemble_source("main.asm", "lda #1\nsta 0x0400\nrts");
        assert!(result.succeeded(), "{:?}", result.errors);
        assert_eq!(
            prg_image(&result.memory),
            vec![0x00, 0x10, 0xa9, 0x01, 0x8d, 0x00, 0x04, 0x60]
        );
    }

    #[test]
    fn empty_source_converges_immediately() {
        let result = assemble_source("main.asm", "");
        assert!(result.succeeded());
        assert_eq!(result.passes, 1);
        assert_eq!(prg_image(&result.memory), vec![0x00, 0x10]);
    }

    #[test]
    fn label_definition_and_reuse() {
        let result = assemble_source("main.asm", "start:\n  jmp start");
        assert!(result.succeeded());
        assert_eq!(
            prg_image(&result.memory),
            vec![0x00, 0x10, 0x4c, 0x00, 0x10]
        );
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let result = assemble_source("main.asm", "a:\na:");
        assert!(!result.succeeded());
        assert!(result.errors[0].contains("already defined"));
    }

    #[test]
    fn invalid_syntax_is_reported_with_position() {
        let result = assemble_source("main.asm", "nop\n???");
        assert!(!result.succeeded());
        assert!(result.errors[0].starts_with("main.asm:2 "));
    }

    #[test]
    fn prg_image_fills_gaps_with_zero() {
        let mut memory = BTreeMap::new();
        memory.insert(0x1000, 0xaa);
        memory.insert(0x1003, 0xbb);
        assert_eq!(prg_image(&memory), vec![0x00, 0x10, 0xaa, 0, 0, 0xbb]);
    }
}
