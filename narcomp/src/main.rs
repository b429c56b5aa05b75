use clap::Parser;
use narcomp::args::Args;

fn main() {
    let args = Args::parse();
    let Some(file) = args.file else {
        eprintln!("Usage: narcomp [filename]");
        return;
    };

    let summary = match narcomp::compile(&file) {
        Ok(summary) => summary,
        Err(error) => {
            eprintln!("{error}");
            return;
        }
    };

    if summary.errors > 0 || summary.warnings > 0 {
        eprintln!();
    }
    println!("Summary");
    println!("=======");
    println!("Lines Read: {}", summary.lines);
    println!("Errors: {}", summary.errors);
    println!("Warnings: {}", summary.warnings);
}
