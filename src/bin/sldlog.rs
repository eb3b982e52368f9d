//! sldlog CLI - interactive Prolog-style query loop.
//!
//! Usage:
//! - `sldlog`                 start the REPL
//! - `sldlog file.pl ...`     consult files, then start the REPL
//! - `sldlog --help`          show usage

use sldlog::repl::Repl;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut files = Vec::new();
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--verbose" | "-v" => verbose = true,
            other if other.starts_with('-') => {
                eprintln!("unknown option: {}", other);
                print_help();
                return ExitCode::FAILURE;
            }
            file => files.push(file.to_string()),
        }
    }

    let mut repl = Repl::new().with_verbose(verbose);
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    for file in &files {
        let src = match std::fs::read_to_string(file) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("cannot read {}: {}", file, e);
                return ExitCode::FAILURE;
            }
        };
        match repl.engine_mut().consult_str(&src) {
            Ok(n) => {
                let _ = writeln!(output, "% loaded {} clause(s) from {}", n, file);
            }
            Err(e) => {
                eprintln!("error in {}: {}", file, e);
                return ExitCode::FAILURE;
            }
        }
    }

    run_loop(&mut repl, &mut input, &mut output)
}

fn run_loop<R: BufRead, W: Write>(repl: &mut Repl, input: &mut R, output: &mut W) -> ExitCode {
    match repl.run(input, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("i/o error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("sldlog - SLD resolution with first-argument indexing\n");
    println!("Usage:");
    println!("  sldlog [options] [file.pl ...]");
    println!();
    println!("Options:");
    println!("  -v, --verbose   print per-query solver metrics");
    println!("  -h, --help      show this help");
}
