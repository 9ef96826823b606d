use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sourcemap_explorer::{
    find_inline_sourcemap, find_sourcemap_reference, MappingIndex, Result, Token,
};

#[derive(Parser)]
#[command(name = "smx")]
#[command(about = "Inspect the mappings of a JavaScript source map", long_about = None)]
#[command(version)]
struct Cli {
    /// Source map file, or generated code with an inline map
    map: PathBuf,

    /// Generated code, used to clamp mapping ranges to line ends
    #[arg(short, long)]
    generated: Option<PathBuf>,

    /// Log more (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sources of the map
    Sources,
    /// Print every mapping in generated order
    Tokens,
    /// Find the mapping for a generated position
    Lookup { line: u32, column: u32 },
    /// Find the mapping for a position in an original source
    Reverse {
        /// Source name or index
        source: String,
        line: u32,
        column: u32,
    },
}

fn initialize_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let fallback_filter = format!("sourcemap_explorer={},smx={}", level, level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(fmt_layer)
        .init();
}

fn load(cli: &Cli) -> Result<MappingIndex> {
    let contents = fs::read(&cli.map)?;
    let mut generated = match cli.generated {
        Some(ref path) => Some(fs::read_to_string(path)?),
        None => None,
    };

    let index = if contents.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{') {
        MappingIndex::from_slice(&contents)?
    } else {
        let text = String::from_utf8_lossy(&contents).into_owned();
        match find_inline_sourcemap(&text)? {
            Some(map) => {
                tracing::info!(path = %cli.map.display(), "using inline source map");
                if generated.is_none() {
                    generated = Some(text);
                }
                MappingIndex::from_slice(&map)?
            }
            None => match find_sourcemap_reference(&text) {
                Some(url) => {
                    let path = cli.map.parent().unwrap_or_else(|| Path::new("")).join(url);
                    tracing::info!(path = %path.display(), "following sourceMappingURL");
                    let index = MappingIndex::from_path(&path)?;
                    if generated.is_none() {
                        generated = Some(text);
                    }
                    index
                }
                // not JSON either, let the parser report it
                None => MappingIndex::from_slice(&contents)?,
            },
        }
    };

    Ok(match generated {
        Some(text) => index.with_generated_source(&text),
        None => index,
    })
}

fn print_token(index: &MappingIndex, token: &Token<'_>) {
    match index.range_of(token) {
        Some(range) if range.is_bad_mapping => {
            println!("{} [{}..{}) bad", token, range.start_column, range.end_column)
        }
        Some(range) => println!("{} [{}..{})", token, range.start_column, range.end_column),
        None => println!("{}", token),
    }
}

fn find_source(index: &MappingIndex, source: &str) -> Option<u32> {
    index
        .sources()
        .position(|s| s.get_name() == source)
        .map(|idx| idx as u32)
        .or_else(|| source.parse().ok().filter(|&id| id < index.get_source_count()))
}

fn run(cli: Cli) -> Result<()> {
    let index = load(&cli)?;

    match cli.command {
        Command::Sources => {
            for (idx, source) in index.sources().enumerate() {
                let mappings = index.source_tokens(idx as u32).count();
                println!("{}\t{}\t{} mappings", idx, source.get_name(), mappings);
            }
        }
        Command::Tokens => {
            for token in index.tokens() {
                println!("{}", token);
            }
        }
        Command::Lookup { line, column } => match index.lookup_token(line, column) {
            Some(token) => print_token(&index, &token),
            None => println!("no mapping"),
        },
        Command::Reverse { ref source, line, column } => {
            let src_id = match find_source(&index, source) {
                Some(src_id) => src_id,
                None => {
                    println!("unknown source {}", source);
                    return Ok(());
                }
            };
            match index.lookup_original(src_id, line, column) {
                Some(token) => print_token(&index, &token),
                None => println!("no mapping"),
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    initialize_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {}", err);
        for cause in err.iter().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        process::exit(1);
    }
}
