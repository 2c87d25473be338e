use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use striate::{OutOptions, Pipeline};

#[derive(Parser)]
#[command(name = "striate", about = "Line-oriented stream filters — shell text tools over async pipelines")]
struct Cli {
    /// Write debug logs to /tmp/striate-debug.log (tail -f to inspect).
    #[arg(long)]
    debug: bool,

    /// Write output to FILE instead of stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a file (or stdin) line by line.
    Cat { file: Option<PathBuf> },
    /// Keep lines matching a regex.
    Grep {
        pattern: String,
        file: Option<PathBuf>,
    },
    /// Replace the first regex match on each line.
    Sed {
        pattern: String,
        replacement: String,
        file: Option<PathBuf>,
    },
    /// Print the first N lines.
    Head {
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: u64,
        file: Option<PathBuf>,
    },
    /// Print the last N lines.
    Tail {
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,
        file: Option<PathBuf>,
    },
    /// Byte-wise sort (buffers the entire input).
    Sort { file: Option<PathBuf> },
    /// Drop lines identical to their immediate predecessor.
    Uniq { file: Option<PathBuf> },
    /// Split input into numbered section files of N lines each.
    Split {
        #[arg(short = 'l', long, default_value_t = 1000)]
        lines: u64,
        /// Section files are named PREFIX0000, PREFIX0001, …
        #[arg(short, long, default_value = "x")]
        prefix: String,
        file: Option<PathBuf>,
    },
}

fn source(file: Option<PathBuf>) -> Pipeline {
    match file {
        Some(path) => Pipeline::cat(path),
        None => Pipeline::from_reader(tokio::io::stdin()),
    }
}

async fn emit(pipeline: Pipeline, output: Option<PathBuf>) -> striate::Result<()> {
    match output {
        Some(path) => pipeline.out(path).await,
        None => {
            pipeline
                .write_to(tokio::io::stdout(), OutOptions::default())
                .await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/striate-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
        tracing::info!("striate debug log started — tail -f /tmp/striate-debug.log");
    }

    let output = cli.output;
    match cli.command {
        Command::Cat { file } => emit(source(file), output).await?,
        Command::Grep { pattern, file } => {
            let re = Regex::new(&pattern)?;
            emit(source(file).grep(re), output).await?;
        }
        Command::Sed {
            pattern,
            replacement,
            file,
        } => {
            let re = Regex::new(&pattern)?;
            emit(source(file).sed(re, replacement), output).await?;
        }
        Command::Head { lines, file } => emit(source(file).head(lines), output).await?,
        Command::Tail { lines, file } => emit(source(file).tail(lines), output).await?,
        Command::Sort { file } => emit(source(file).sort(), output).await?,
        Command::Uniq { file } => emit(source(file).uniq(), output).await?,
        Command::Split {
            lines,
            prefix,
            file,
        } => {
            source(file)
                .divide(lines, move |section, index| {
                    let path = PathBuf::from(format!("{prefix}{index:04}"));
                    section.out(path)
                })
                .await?;
        }
    }
    Ok(())
}
