// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive statements.
//!
//! A directive chunk starts with `.` followed by the directive name and
//! an argument list. Arguments are full expressions separated by commas;
//! the comma may be left out between two complete expressions. A
//! directive whose name or argument shape does not match anything
//! reports one "Invalid directive" error.
//!
//! Directives that read files (`.binary`, `.music`, `.bitmap`,
//! `.sprite`) load each file once per run through a [`MediaCache`]; the
//! decoded content is replayed on every later pass.

use std::collections::HashMap;
use std::fs;

use crate::core::bmp::{self, Image};
use crate::core::context::{Context, ReadPointer, RepeatFrame};
use crate::core::eval::{self, format_value, Lambda, Value};
use crate::core::petscii::{self, Encoding};
use crate::core::sid::{self, Music};
use crate::core::tokenizer::{join_tokens, Token};

/// Run-scoped cache of file content pulled in by directives, shared by
/// all passes of one assembly run.
#[derive(Default)]
pub struct MediaCache {
    binary: HashMap<String, Vec<u8>>,
    music: HashMap<String, Music>,
    images: HashMap<String, Image>,
}

/// Handle one directive chunk. Returns whether the read pointer should
/// advance past this statement; `.import` and `.endr` move it
/// themselves.
pub fn assemble_directive(chunk: &[Token], ctx: &mut Context, cache: &mut MediaCache) -> bool {
    let directive = chunk[1].text.clone();
    let arg_text = join_tokens(&chunk[2..]);
    let arguments = if arg_text.trim().is_empty() {
        Vec::new()
    } else {
        eval::expression_list(&arg_text, ctx)
    };

    match directive.as_str() {
        "byte" => {
            for arg in &arguments {
                let value = eval::byte_value(arg, ctx);
                ctx.store(value);
            }
        }

        "word" => {
            for arg in &arguments {
                let value = eval::word_value(arg, ctx);
                ctx.store((value & 0xff) as u8);
                ctx.store((value >> 8) as u8);
            }
        }

        // .string is the zero-terminated variant of .text
        "text" | "string" => {
            for arg in &arguments {
                match arg {
                    Value::Str(text) => {
                        for character in text.chars() {
                            match petscii::ord(ctx.encoding, character) {
                                Some(code) => ctx.store(code),
                                None => ctx.report_error(format!(
                                    "Unknown character \"{character}\" in text \"{text}\""
                                )),
                            }
                        }
                        if directive == "string" {
                            ctx.store(0);
                        }
                    }
                    other => ctx.report_error(format!(
                        "Expected text instead of: \"{}\"",
                        format_value(other)
                    )),
                }
            }
        }

        "encoding" => match arguments.as_slice() {
            [Value::Int(index)] => match Encoding::from_index(*index) {
                Some(encoding) => ctx.encoding = encoding,
                None => ctx.report_error(format!("Invalid encoding: {index}")),
            },
            _ => invalid(&directive, &arg_text, ctx),
        },

        // '#' is a set bit, ' ' a clear one, eight pixels per byte
        "bits" => {
            for arg in &arguments {
                match arg {
                    Value::Str(pattern) => {
                        let digits: String = pattern
                            .chars()
                            .map(|c| match c {
                                ' ' => '0',
                                '#' => '1',
                                other => other,
                            })
                            .collect();
                        let groups: Vec<char> = digits.chars().collect();
                        for group in groups.chunks(8) {
                            let group: String = group.iter().collect();
                            let value = eval::byte_expression(&format!("0b{group}"), ctx);
                            ctx.store(value);
                        }
                    }
                    other => ctx.report_error(format!(
                        "Expected text instead of: \"{}\"",
                        format_value(other)
                    )),
                }
            }
        }

        "org" => match arguments.as_slice() {
            [Value::Int(address)] => ctx.set_location(*address),
            _ => invalid(&directive, &arg_text, ctx),
        },

        "align" => match arguments.as_slice() {
            [Value::Int(alignment)] if *alignment > 0 => {
                let location = ctx.location();
                let excess = location.rem_euclid(*alignment);
                if excess > 0 {
                    ctx.set_location(location - excess + alignment);
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "bytefill" | "wordfill" => {
            let wide = directive == "wordfill";
            match arguments.as_slice() {
                [Value::Int(count)] => fill(*count, None, wide, ctx),
                [Value::Int(count), producer]
                    if producer.is_callable() || matches!(producer, Value::Str(_)) =>
                {
                    let producer = fill_function(producer, ctx);
                    fill(*count, Some(producer), wide, ctx);
                }
                _ => invalid(&directive, &arg_text, ctx),
            }
        }

        "print" if !arguments.is_empty() => {
            for arg in &arguments {
                println!("{}", format_value(arg));
            }
        }

        "warning" => match arguments.as_slice() {
            [Value::Str(message)] => {
                let message = message.clone();
                ctx.report_warning(message);
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "error" => match arguments.as_slice() {
            [Value::Str(message)] => {
                let message = message.clone();
                ctx.report_error(message);
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "repeat" => match arguments.as_slice() {
            [Value::Str(iterator), Value::Int(count)] => {
                if let Some(resume) = ctx.read_pointer().cloned() {
                    ctx.repeats.push(RepeatFrame {
                        iterator: iterator.clone(),
                        count: *count,
                        resume,
                    });
                    ctx.symbols.insert(iterator.clone(), Value::Int(0));
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "endr" if arguments.is_empty() => {
            match ctx.repeats.last().cloned() {
                Some(frame) => {
                    let next = match ctx.symbols.get(&frame.iterator) {
                        Some(Value::Int(value)) => value + 1,
                        _ => 1,
                    };
                    ctx.symbols
                        .insert(frame.iterator.clone(), Value::Int(next));
                    if next < frame.count {
                        // Re-enter the body, the chunk after the .repeat.
                        ctx.jump_read_pointer(ReadPointer::new(
                            frame.resume.stream.clone(),
                            frame.resume.index + 1,
                        ));
                        return false;
                    }
                    ctx.repeats.pop();
                }
                None => ctx.report_error("End repeat without matching repeat"),
            }
        }

        "import" => match arguments.as_slice() {
            [Value::Str(name)] => {
                let file = ctx.path.join(name);
                if file.extension().is_some_and(|ext| ext == "py") {
                    ctx.report_error(format!(
                        "Python imports are not supported: \"{}\"",
                        file.display()
                    ));
                } else {
                    ctx.advance_read_pointer();
                    ctx.push_read_pointer(ReadPointer::new(file.to_string_lossy(), 0));
                    return false;
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "binary" => match arguments.as_slice() {
            [Value::Str(name)] => {
                if !cache.binary.contains_key(name) {
                    match fs::read(ctx.path.join(name)) {
                        Ok(bytes) => {
                            log::info!("Loading: {name}");
                            cache.binary.insert(name.clone(), bytes);
                        }
                        Err(err) => {
                            ctx.report_error(format!("Failed to open \"{name}\": {err}"))
                        }
                    }
                }
                if let Some(bytes) = cache.binary.get(name) {
                    for &byte in bytes {
                        ctx.store(byte);
                    }
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "music" => match arguments.as_slice() {
            [Value::Str(name), Value::Str(prefix)] => {
                if !cache.music.contains_key(name) {
                    match sid::load(&ctx.path.join(name)) {
                        Ok(music) => {
                            log::info!("Loading: {name}");
                            cache.music.insert(name.clone(), music);
                        }
                        Err(err) => {
                            ctx.report_error(err.to_string());
                            ctx.report_error(format!("Music not loaded: \"{name}\""));
                        }
                    }
                }
                if let Some(music) = cache.music.get(name) {
                    ctx.symbols.insert(
                        format!("{prefix}_LOAD"),
                        Value::Int(music.load_address as i64),
                    );
                    ctx.symbols.insert(
                        format!("{prefix}_INIT"),
                        Value::Int(music.init_address as i64),
                    );
                    ctx.symbols.insert(
                        format!("{prefix}_PLAY"),
                        Value::Int(music.play_address as i64),
                    );
                    for &byte in &music.data {
                        ctx.store(byte);
                    }
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "bitmap" | "sprite" => match arguments.as_slice() {
            [Value::Str(name), Value::Int(_bits_per_pixel)] => {
                if !cache.images.contains_key(name) {
                    match bmp::load(&ctx.path.join(name)) {
                        Ok(image) => {
                            log::info!("Loading: {name}");
                            cache.images.insert(name.clone(), image);
                        }
                        Err(err) => {
                            ctx.report_error(err.to_string());
                            ctx.report_error(format!("Image not loaded: \"{name}\""));
                        }
                    }
                }
                if let Some(image) = cache.images.get(name) {
                    for &byte in &image.data {
                        ctx.store(byte);
                    }
                }
            }
            _ => invalid(&directive, &arg_text, ctx),
        },

        "zpbyte" | "zpword" if !arguments.is_empty() => {
            let size = if directive == "zpword" { 2 } else { 1 };
            for arg in &arguments {
                match arg {
                    Value::Str(name) => {
                        if ctx.zp_address + size <= 0x100 {
                            if !ctx.labels.contains(name) {
                                ctx.symbols
                                    .insert(name.clone(), Value::Int(ctx.zp_address));
                                ctx.labels.insert(name.clone());
                                ctx.zp_address += size;
                            } else {
                                ctx.report_error(format!(
                                    "Label was already defined: \"{name}\""
                                ));
                            }
                        } else {
                            ctx.report_error(format!(
                                "No space for zero page variable: \"{name}\""
                            ));
                        }
                    }
                    other => ctx.report_error(format!(
                        "Expected text instead of: \"{}\"",
                        format_value(other)
                    )),
                }
            }
        }

        _ => invalid(&directive, &arg_text, ctx),
    }

    true
}

fn invalid(directive: &str, arg_text: &str, ctx: &mut Context) {
    ctx.report_error(format!("Invalid directive: .{directive} {arg_text}"));
}

/// Resolve the fill producer argument to a callable. Text arguments are
/// evaluated first so a quoted function literal also works.
fn fill_function(producer: &Value, ctx: &mut Context) -> Value {
    if producer.is_callable() {
        return producer.clone();
    }
    match producer {
        Value::Str(text) => match eval::expression(text, ctx) {
            Some(value) => eval::function_value(&value, ctx),
            None => Value::Lambda(Lambda::identity()),
        },
        other => eval::function_value(other, ctx),
    }
}

fn fill(count: i64, producer: Option<Value>, wide: bool, ctx: &mut Context) {
    for index in 0..count.max(0) {
        let value = match &producer {
            Some(function) => match eval::call_value(function, &[Value::Int(index)], ctx) {
                Ok(value) => value,
                Err(err) => {
                    ctx.report_error(err.message);
                    Value::Int(0)
                }
            },
            None => Value::Int(0),
        };
        if wide {
            let word = eval::word_value(&value, ctx);
            ctx.store((word & 0xff) as u8);
            ctx.store((word >> 8) as u8);
        } else {
            let byte = eval::byte_value(&value, ctx);
            ctx.store(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::tokenize;

    fn ctx_at(origin: i64) -> Context {
        let mut ctx = Context::new(Default::default(), Default::default());
        ctx.set_location(origin);
        ctx.push_read_pointer(ReadPointer::new("test", 0));
        ctx
    }

    fn run(source: &str, ctx: &mut Context) -> bool {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty());
        let chunk: Vec<Token> = tokens
            .into_iter()
            .filter(|token| !token.is_newline())
            .collect();
        let mut cache = MediaCache::default();
        assemble_directive(&chunk, ctx, &mut cache)
    }

    fn emitted(ctx: &Context, origin: u16, count: usize) -> Vec<u8> {
        (0..count as u16)
            .map(|i| ctx.memory.get(&(origin + i)).copied().unwrap_or(0))
            .collect()
    }

    #[test]
    fn byte_directive_stores_values() {
        let mut ctx = ctx_at(0x1000);
        run(".byte 1, 2, 3", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![1, 2, 3]);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn word_directive_stores_little_endian() {
        let mut ctx = ctx_at(0x1000);
        run(".word 0x1234", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![0x34, 0x12]);
    }

    #[test]
    fn text_encodes_and_string_terminates() {
        let mut ctx = ctx_at(0x1000);
        run(".text \"AB\"", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![1, 2]);

        let mut ctx = ctx_at(0x1000);
        run(".string \"A\"", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 2), vec![1, 0]);
    }

    #[test]
    fn text_reports_unknown_characters() {
        let mut ctx = ctx_at(0x1000);
        run(".text \"aé\"", &mut ctx);
        // Lowercase is not in the default uppercase screen encoding.
        assert_eq!(ctx.errors.len(), 2);
    }

    #[test]
    fn encoding_switches_tables() {
        let mut ctx = ctx_at(0x1000);
        run(".encoding 3", &mut ctx);
        assert_eq!(ctx.encoding, Encoding::PetsciiMixed);
        run(".text \"a\"", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 1), vec![65]);

        run(".encoding 9", &mut ctx);
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn bits_directive_packs_patterns() {
        let mut ctx = ctx_at(0x1000);
        run(".bits \"#      ##      ##      #\"", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0b10000001, 0b10000001, 0b10000001]);
    }

    #[test]
    fn org_and_align_move_the_location() {
        let mut ctx = ctx_at(0x1000);
        run(".org 0x2001", &mut ctx);
        assert_eq!(ctx.location(), 0x2001);
        run(".align 0x100", &mut ctx);
        assert_eq!(ctx.location(), 0x2100);
        run(".align 0x100", &mut ctx);
        assert_eq!(ctx.location(), 0x2100);
    }

    #[test]
    fn bytefill_with_and_without_function() {
        let mut ctx = ctx_at(0x1000);
        run(".bytefill 3", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0, 0, 0]);

        let mut ctx = ctx_at(0x1000);
        run(".bytefill 3, |x| x * 2", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![0, 2, 4]);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn wordfill_stores_pairs() {
        let mut ctx = ctx_at(0x1000);
        run(".wordfill 2, |x| 0x100 + x", &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 4), vec![0x00, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn warning_and_error_directives() {
        let mut ctx = ctx_at(0x1000);
        run(".warning \"careful\"", &mut ctx);
        run(".error \"broken\"", &mut ctx);
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.warnings[0].contains("careful"));
        assert!(ctx.errors[0].contains("broken"));
    }

    #[test]
    fn zero_page_allocation() {
        let mut ctx = ctx_at(0x1000);
        run(".zpbyte \"flag\"", &mut ctx);
        run(".zpword \"ptr\"", &mut ctx);
        assert_eq!(ctx.symbols.get("flag"), Some(&Value::Int(2)));
        assert_eq!(ctx.symbols.get("ptr"), Some(&Value::Int(3)));
        assert_eq!(ctx.zp_address, 5);

        run(".zpbyte \"flag\"", &mut ctx);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("already defined"));
    }

    #[test]
    fn endr_without_repeat_is_an_error() {
        let mut ctx = ctx_at(0x1000);
        let advance = run(".endr", &mut ctx);
        assert!(advance);
        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn unknown_directive_reports_error() {
        let mut ctx = ctx_at(0x1000);
        run(".frobnicate 1", &mut ctx);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("Invalid directive: .frobnicate"));
    }

    #[test]
    fn binary_directive_stores_file_bytes() {
        let dir = std::env::temp_dir();
        let name = format!("prgforge-binary-test-{}.bin", std::process::id());
        fs::write(dir.join(&name), [9u8, 8, 7]).unwrap();

        let mut ctx = ctx_at(0x1000);
        ctx.path = dir.clone();
        run(&format!(".binary \"{name}\""), &mut ctx);
        assert_eq!(emitted(&ctx, 0x1000, 3), vec![9, 8, 7]);
        assert!(ctx.errors.is_empty());

        let _ = fs::remove_file(dir.join(&name));
    }

    #[test]
    fn missing_binary_reports_uniform_error() {
        let mut ctx = ctx_at(0x1000);
        run(".binary \"does-not-exist.bin\"", &mut ctx);
        assert_eq!(ctx.errors.len(), 1);
        assert!(ctx.errors[0].contains("Failed to open"));
    }
}
