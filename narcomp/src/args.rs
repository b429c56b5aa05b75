use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Args {
    /// Path to the source file we're compiling.
    pub file: Option<PathBuf>,
}
