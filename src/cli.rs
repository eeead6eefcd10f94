// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and logging setup.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const VERSION: &str = "0.1";

const LONG_ABOUT: &str = "Multi-pass 6502 cross-assembler producing C64 PRG images.

The assembler runs full passes over the source until the memory image
settles, so labels may be used before they are defined. The memory
report, warnings and errors describe the converged result. Without
-o/--outfile the program assembles and reports but writes no file.";

#[derive(Parser, Debug)]
#[command(
    name = "prgforge",
    version = VERSION,
    about = "Multi-pass 6502 cross-assembler producing C64 PRG images",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'a',
        long = "asm",
        value_name = "FILE",
        long_help = "Assembly source file. Its directory becomes the base for .import and the binary include directives."
    )]
    pub input: PathBuf,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Write the assembled program as a C64 PRG file: a two byte little endian load address followed by the memory content. Only written when assembly finishes without errors."
    )]
    pub output: Option<PathBuf>,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        long_help = "Increase log verbosity. File loads are logged by default; -v adds per-pass progress."
    )]
    pub verbose: u8,
}

pub fn initialize_logging(verbosity: u8) {
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(match verbosity {
            0 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .chain(std::io::stdout())
        .apply();
    if let Err(err) = result {
        eprintln!("logging setup failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_input_and_output() {
        let cli = Cli::parse_from(["prgforge", "-a", "game.asm", "-o", "game.prg"]);
        assert_eq!(cli.input, PathBuf::from("game.asm"));
        assert_eq!(cli.output, Some(PathBuf::from("game.prg")));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_counts_verbosity() {
        let cli = Cli::parse_from(["prgforge", "-a", "game.asm", "-v", "-v"]);
        assert!(cli.output.is_none());
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn cli_requires_an_input_file() {
        assert!(Cli::try_parse_from(["prgforge"]).is_err());
    }
}
