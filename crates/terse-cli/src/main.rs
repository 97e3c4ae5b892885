//! `terse` CLI — build and query structured data from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Build a document from shorthand expressions
//! terse 'foo.bar: 1, tags: [a, b]'
//!
//! # Mutate a document piped in as JSON
//! echo '{"foo": [1, 2]}' | terse 'foo[]: 3'
//!
//! # Query without mutating
//! echo '{"items": [1, 2, 3]}' | terse -q 'items[:1]'
//!
//! # Output shorthand or CBOR instead of JSON
//! terse -f shorthand 'foo{id: 1}'
//! terse -f cbor 'b: %aGVsbG8=' > out.cbor
//! ```

use std::io::{self, IsTerminal, Read, Write};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use terse_core::{get_path, Document, GetOptions, ParseOptions, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Cbor,
    Shorthand,
}

#[derive(Parser)]
#[command(
    name = "terse",
    version,
    about = "Generate and query structured data from shorthand",
    after_help = "Example: terse 'foo.bar: 1, baz: true'"
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Query to run against the built document
    #[arg(short, long)]
    query: Option<String>,

    /// Print parser debug output on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Shorthand expressions, joined with spaces
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.args.is_empty() && cli.query.is_none() {
        eprintln!("At least one expression or --query must be passed");
        process::exit(1);
    }

    let debug_logger: Option<terse_core::DebugLogger> = cli
        .verbose
        .then(|| Arc::new(|msg: &str| eprintln!("{msg}")) as terse_core::DebugLogger);

    let existing = read_stdin_document()?;

    let mut result = existing.unwrap_or(Value::Null);
    if !cli.args.is_empty() {
        let input = cli.args.join(" ");
        if cli.verbose {
            eprintln!("Input: {input}");
        }

        let mut doc = Document::new(ParseOptions {
            enable_file_input: true,
            enable_object_detection: true,
            force_string_keys: cli.format == Format::Json,
            debug_logger: debug_logger.clone(),
        });
        if let Err(err) = doc.parse(&input) {
            eprintln!("{}", err.pretty());
            process::exit(1);
        }
        result = match doc.apply(Some(result)) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("{}", err.pretty());
                process::exit(1);
            }
        };
    }

    if let Some(query) = &cli.query {
        match get_path(query, &result, GetOptions { debug_logger }) {
            Ok((selected, true)) => result = selected,
            Ok((_, false)) => {
                println!("No match");
                return Ok(());
            }
            Err(err) => {
                eprintln!("{}", err.pretty());
                process::exit(1);
            }
        }
    }

    write_output(cli.format, &result)
}

/// Read a JSON document from stdin when input is piped in; an interactive
/// terminal or empty pipe means no existing document.
fn read_stdin_document() -> Result<Option<Value>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin
        .lock()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    if buf.trim().is_empty() {
        return Ok(None);
    }
    let parsed: serde_json::Value =
        serde_json::from_str(&buf).context("Failed to parse stdin as JSON")?;
    Ok(Some(Value::from(parsed)))
}

fn write_output(format: Format, value: &Value) -> Result<()> {
    match format {
        Format::Json => {
            let rendered =
                serde_json::to_string_pretty(value).context("Failed to render JSON")?;
            println!("{rendered}");
        }
        Format::Cbor => {
            let mut stdout = io::stdout().lock();
            ciborium::into_writer(&value.to_cbor(), &mut stdout)
                .context("Failed to render CBOR")?;
            stdout.flush().context("Failed to flush output")?;
        }
        Format::Shorthand => {
            println!("{}", terse_core::marshal(value));
        }
    }
    Ok(())
}
