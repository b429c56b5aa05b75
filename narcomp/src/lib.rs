pub mod args;
mod diag;
mod parse;
mod scan;

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Name of the emitted translation unit, written to the working directory.
pub const OUTPUT_FILE: &str = "narcomp_output.c";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error opening input file.")]
    Input(#[source] io::Error),
    #[error("Error opening file for output.")]
    Output(#[source] io::Error),
}

/// What one compilation did, independent of any file I/O.
pub struct Outcome {
    /// The finalized translation unit; present iff no errors were found.
    pub code: Option<String>,
    pub lines: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Every diagnostic in report order, as printed.
    pub diagnostics: Vec<String>,
}

pub struct Summary {
    pub lines: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Compiles one source text to C in a single pass. Analysis always runs to
/// completion; emission is abandoned at the first error.
pub fn compile_source(source: &[u8]) -> Outcome {
    let mut parser = parse::Parser::new(source);
    parser.run();
    parser.into_outcome()
}

/// Compiles the file at `path` and settles the output artifact: the emitted
/// unit is written on success, and any stale artifact is removed when the
/// run had errors.
pub fn compile(path: &Path) -> Result<Summary, Error> {
    let source = fs::read(path).map_err(Error::Input)?;
    let outcome = compile_source(&source);
    match &outcome.code {
        Some(code) => fs::write(OUTPUT_FILE, code).map_err(Error::Output)?,
        None => {
            let _ = fs::remove_file(OUTPUT_FILE);
        }
    }
    Ok(Summary {
        lines: outcome.lines,
        errors: outcome.errors,
        warnings: outcome.warnings,
    })
}
