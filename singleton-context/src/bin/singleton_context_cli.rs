use clap::Parser;
use singleton_context::{DEFAULT_MAX_CHUNK_SIZE, chunk_file};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to split text into sentence-bounded chunks, printed as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Path used to derive chunk identifiers. Defaults to the input path.
    #[arg(short, long)]
    path: Option<String>,

    /// Maximum length for each chunk, in characters.
    #[arg(short, long, default_value_t = DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let path = args
        .path
        .or(args.input)
        .unwrap_or_else(|| "stdin".to_string());

    let chunks = chunk_file(&path, &file_content, args.max_chunk_size);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{json_output}");

    Ok(())
}
