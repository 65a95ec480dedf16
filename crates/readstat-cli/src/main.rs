//! readstat - Inspect variant blobs from an e-reader database
//!
//! This tool decodes the extra data blobs stored in the reader's event
//! table and prints their contents, for working out what a firmware
//! version writes.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use readstat_core::{DecoderConfig, Variant, VariantDecoder, VariantMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

/// Inspect variant blobs from an e-reader database
#[derive(Parser, Debug)]
#[command(name = "readstat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Decode a single variant instead of a string-keyed map
    #[arg(long)]
    single: bool,

    /// Fail if bytes remain after decoding
    #[arg(long)]
    strict: bool,

    /// Maximum nesting of lists and maps
    #[arg(long, default_value = "64")]
    max_depth: usize,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a file holding a raw blob
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Blob as a hex string
    #[arg(long)]
    hex: Option<String>,
}

/// Output format for decoded values
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One `key = value` line per entry
    Text,
    /// Keys only (for scripting)
    Keys,
}

/// Outcome of decoding one blob
#[derive(Debug)]
struct Decoded {
    value: Variant,
    tag: Option<u32>,
    trailing: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let data = if let Some(ref file) = cli.input.file {
        read_blob_file(file)?
    } else if let Some(ref hex) = cli.input.hex {
        parse_hex(hex)?
    } else {
        bail!("Either --file or --hex must be specified")
    };

    info!("Decoding {} bytes", data.len());
    let decoded = decode(&cli, &data)?;

    if decoded.trailing > 0 {
        if cli.strict {
            bail!("{} bytes remain after decoding", decoded.trailing);
        }
        warn!("{} bytes remain after decoding", decoded.trailing);
    }
    if let Some(tag) = decoded.tag {
        debug!("Variant type tag {}", tag);
    }

    for line in render(&decoded.value, cli.format) {
        println!("{}", line);
    }

    Ok(())
}

/// Read a raw blob from disk
fn read_blob_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        bail!("Input path is not a file: {}", path.display());
    }
    trace!("Reading {}", path.display());
    fs::read(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

/// Parse a hex string, ignoring whitespace and an optional `0x` prefix
fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.split_whitespace().collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    hex::decode(digits).context("Invalid hex input")
}

/// Decode the blob as configured on the command line
fn decode(cli: &Cli, data: &[u8]) -> Result<Decoded> {
    let decoder = VariantDecoder::with_config(DecoderConfig::new().max_depth(cli.max_depth));

    if cli.single {
        let mut reader = decoder.reader(data);
        let (tag, value) = reader
            .read_variant()
            .context("Failed to decode variant")?;
        return Ok(Decoded {
            value,
            tag: Some(tag),
            trailing: reader.remaining(),
        });
    }

    let mut reader = decoder.reader(data);
    let map = reader.read_map().context("Failed to decode map")?;
    let trailing = reader.remaining();

    Ok(Decoded {
        value: Variant::Map(map),
        tag: None,
        trailing,
    })
}

/// Render a decoded value as output lines
fn render(value: &Variant, format: OutputFormat) -> Vec<String> {
    match (value, format) {
        (Variant::Map(map), OutputFormat::Text) => render_map(map),
        (Variant::Map(map), OutputFormat::Keys) => map.keys().cloned().collect(),
        (other, _) => vec![other.to_string()],
    }
}

fn render_map(map: &VariantMap) -> Vec<String> {
    map.iter()
        .map(|(key, value)| format!("{} = {}", key, value))
        .collect()
}
