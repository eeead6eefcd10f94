// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End to end assembly scenarios.

use std::collections::BTreeMap;

use super::{assemble_source, prg_image, Assembler, Assembly};

fn bytes_at(result: &Assembly, origin: u16, count: usize) -> Vec<u8> {
    (0..count as u16)
        .map(|i| result.memory.get(&(origin + i)).copied().unwrap_or(0))
        .collect()
}

#[test]
fn forward_reference_resolves_on_second_pass() {
    let source = "\
  jmp end\n\
  nop\n\
end:\n\
  rts\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    // jmp (3) + nop (1), so end sits at $1004.
    assert_eq!(bytes_at(&result, 0x1000, 5), vec![0x4c, 0x04, 0x10, 0xea, 0x60]);
    assert!(result.passes >= 2);
}

#[test]
fn backward_reference_only_still_needs_a_settling_pass() {
    let result = assemble_source("main.asm", "loop:\n  jmp loop\n");
    assert!(result.succeeded());
    assert_eq!(result.passes, 2);
}

#[test]
fn repeat_binds_iterator_for_each_round() {
    let source = "\
.repeat \"i\" 3\n\
.byte i\n\
.endr\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(bytes_at(&result, 0x1000, 3), vec![0, 1, 2]);
}

#[test]
fn repeat_reenters_a_multi_statement_body() {
    let source = "\
.repeat \"i\" 3\n\
.byte i\n\
.byte i + 100\n\
.endr\n\
.byte 99\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(
        bytes_at(&result, 0x1000, 7),
        vec![0, 100, 1, 101, 2, 102, 99]
    );
}

#[test]
fn forward_word_reference_settles() {
    let source = "\
.word data\n\
data:\n\
.byte 7\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    // The word itself occupies $1000-$1001, so data lands at $1002.
    assert_eq!(bytes_at(&result, 0x1000, 3), vec![0x02, 0x10, 7]);
}

#[test]
fn nested_repeat_blocks() {
    let source = "\
.repeat \"i\" 2\n\
.repeat \"j\" 2\n\
.byte i * 2 + j\n\
.endr\n\
.endr\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(bytes_at(&result, 0x1000, 4), vec![0, 1, 2, 3]);
}

#[test]
fn assignment_defines_symbols() {
    let source = "\
border = 0xd020\n\
  lda #0\n\
  sta border\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(
        bytes_at(&result, 0x1000, 5),
        vec![0xa9, 0x00, 0x8d, 0x20, 0xd0]
    );
}

#[test]
fn dollar_prefix_reads_as_hexadecimal() {
    let result = assemble_source("main.asm", ".word $1234\n");
    assert!(result.succeeded());
    assert_eq!(bytes_at(&result, 0x1000, 2), vec![0x34, 0x12]);
}

#[test]
fn overwrite_keeps_second_value_and_warns() {
    let source = "\
.org 0x1000\n\
.byte 1\n\
.org 0x1000\n\
.byte 2\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(bytes_at(&result, 0x1000, 1), vec![2]);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].contains("overwritten"));
}

#[test]
fn prg_starts_at_lowest_used_address() {
    let source = ".org $1000\n.byte 1, 2, 3\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(prg_image(&result.memory), vec![0x00, 0x10, 1, 2, 3]);
}

#[test]
fn branch_out_of_range_emits_two_bytes_and_one_error() {
    let source = "\
.org $1000\n\
  bne far\n\
.org $2000\n\
far:\n\
  rts\n";
    let result = assemble_source("main.asm", source);
    assert!(!result.succeeded());
    let range_errors = result
        .errors
        .iter()
        .filter(|error| error.contains("Branch destination out of range"))
        .count();
    assert_eq!(range_errors, 1);
    assert_eq!(bytes_at(&result, 0x1000, 2), vec![0xd0, 0x00]);
}

#[test]
fn local_labels_are_scoped_to_their_parent() {
    let source = "\
first:\n\
_loop:\n\
  jmp _loop\n\
second:\n\
_loop:\n\
  jmp _loop\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    // Each jmp targets its own _loop.
    assert_eq!(bytes_at(&result, 0x1000, 3), vec![0x4c, 0x00, 0x10]);
    assert_eq!(bytes_at(&result, 0x1003, 3), vec![0x4c, 0x03, 0x10]);
}

#[test]
fn generator_expands_to_statements() {
    let source = "@\"lda #\" + \"1\"\n  rts\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(bytes_at(&result, 0x1000, 3), vec![0xa9, 0x01, 0x60]);
}

#[test]
fn extension_generator_produces_code() {
    let source = "@ldax(0x1234)\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(
        bytes_at(&result, 0x1000, 4),
        vec![0xa9, 0x34, 0xa2, 0x12]
    );
}

#[test]
fn basic_sys_line_boots_the_program() {
    let source = "\
@basicStart()\n\
@basicSys(10, 4096)\n\
@basicEnd()\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    // Load address is the BASIC start.
    let image = prg_image(&result.memory);
    assert_eq!(&image[0..2], &[0x01, 0x08]);
    // Line: link word, line number 10, SYS token, "4096" in PETSCII, zero.
    assert_eq!(
        &image[2..],
        &[
            0x0a, 0x08, 0x0a, 0x00, 0x9e, 0x34, 0x30, 0x39, 0x36, 0x00, 0x00,
            0x00
        ]
    );
}

#[test]
fn import_pulls_in_another_stream() {
    let mut assembler = Assembler::new();
    assembler.add_stream("lib.asm", "shared:\n  rts\n");
    assembler.add_stream("main.asm", ".import \"lib.asm\"\n  jsr shared\n");
    let result = assembler.run("main.asm");
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(
        bytes_at(&result, 0x1000, 4),
        vec![0x60, 0x20, 0x00, 0x10]
    );
}

#[test]
fn python_imports_are_rejected() {
    let result = assemble_source("main.asm", ".import \"helpers.py\"\n");
    assert!(!result.succeeded());
    assert!(result.errors[0].contains("Python imports are not supported"));
}

#[test]
fn missing_import_reports_open_failure() {
    let result = assemble_source("main.asm", ".import \"missing.asm\"\n");
    assert!(!result.succeeded());
    assert!(result.errors[0].contains("Failed to open"));
}

#[test]
fn unresolvable_symbol_never_converges() {
    let result = assemble_source("main.asm", ".byte missing\n");
    assert!(!result.succeeded());
    assert_eq!(result.passes, super::MAX_PASSES);
    assert!(result
        .errors
        .iter()
        .any(|error| error.contains("did not converge")));
}

#[test]
fn memory_report_covers_range_and_labels() {
    let source = "start:\n  rts\n";
    let result = assemble_source("main.asm", source);
    assert!(result.memory_report.contains("Memory used: $1000-$1000 (1 bytes)"));
    assert!(result.memory_report.contains("$1000: start"));
}

#[test]
fn zero_page_addressing_via_zp_variables() {
    let source = "\
.zpword \"ptr\"\n\
  lda (ptr),y\n";
    let result = assemble_source("main.asm", source);
    assert!(result.succeeded(), "{:?}", result.errors);
    assert_eq!(bytes_at(&result, 0x1000, 2), vec![0xb1, 0x02]);
}

#[test]
fn empty_memory_prg_uses_default_origin() {
    let memory: BTreeMap<u16, u8> = BTreeMap::new();
    assert_eq!(prg_image(&memory), vec![0x00, 0x10]);
}
