// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for prgforge.

use clap::Parser;

use prgforge::assembler;
use prgforge::cli::{self, Cli};

fn main() {
    let args = Cli::parse();
    cli::initialize_logging(args.verbose);

    let result = assembler::assemble_file(&args.input);

    print!("{}", result.memory_report);
    for line in result.warnings.iter().chain(result.errors.iter()) {
        eprintln!("{line}");
    }

    if let Some(output) = &args.output {
        if result.succeeded() {
            log::info!("Saving program: {}", output.display());
            if let Err(err) = assembler::save_prg(&result.memory, output) {
                eprintln!("Failed to write \"{}\": {err}", output.display());
                std::process::exit(1);
            }
        } else {
            eprintln!("failed to save \"{}\"", output.display());
        }
    }

    if !result.succeeded() {
        std::process::exit(1);
    }
}
