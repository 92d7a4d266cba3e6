//! Safari Content-Blocker CLI
//!
//! CLI tool for compiling filter lists and querying compiled documents.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use scb_compiler::{compile_filter_list, DistributorConfig};
use scb_core::{decode_engine, encode_engine, Action, Matcher, NetworkEngine, RuleStore};

#[derive(Parser)]
#[command(name = "scb-cli")]
#[command(about = "Safari content-blocker compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists into a content-blocker document
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output document file
        #[arg(short, long, default_value = "blocker.json")]
        output: String,

        /// Maximum number of entries in the document
        #[arg(long, default_value_t = 150_000)]
        max_rules: usize,

        /// Maximum document size in bytes
        #[arg(long)]
        max_json_size: Option<usize>,

        /// Write the framed binary format instead of plain JSON
        #[arg(long)]
        binary: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Match a URL against a compiled document
    Lookup {
        /// Compiled document file
        #[arg(short, long)]
        input: String,

        /// URL to match
        url: String,
    },

    /// Dump document info
    Info {
        /// Compiled document file
        #[arg(short, long)]
        input: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            max_rules,
            max_json_size,
            binary,
            verbose,
        } => cmd_compile(&input, &output, max_rules, max_json_size, binary, verbose),
        Commands::Lookup { input, url } => cmd_lookup(&input, &url),
        Commands::Info { input } => cmd_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(
    inputs: &[String],
    output: &str,
    max_rules: usize,
    max_json_size: Option<usize>,
    binary: bool,
    verbose: bool,
) -> Result<(), String> {
    let start = Instant::now();
    let mut text = String::new();
    let mut total_lines = 0usize;

    for path in inputs {
        let content = if path == "-" {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {e}"))?;
            buf
        } else {
            fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?
        };
        let line_count = content.lines().count();
        total_lines += line_count;

        if verbose {
            println!(
                "  {} - {} lines",
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                line_count
            );
        }

        text.push_str(&content);
        text.push('\n');
    }

    let config = DistributorConfig {
        max_rules,
        max_json_size_bytes: max_json_size,
    };
    let result = compile_filter_list(&text, &config);

    let bytes = if binary {
        let store = RuleStore::parse(&result.json)
            .map_err(|e| format!("Generated document failed validation: {e}"))?;
        let entries: Vec<_> = store
            .iter()
            .map(|r| scb_core::BlockerEntry {
                trigger: r.trigger.clone(),
                action: r.action.clone(),
            })
            .collect();
        encode_engine(&entries).map_err(|e| format!("Failed to encode document: {e}"))?
    } else {
        result.json.into_bytes()
    };

    fs::write(output, &bytes).map_err(|e| format!("Failed to write '{output}': {e}"))?;

    let total_time = start.elapsed();

    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Lines:     {total_lines}");
    println!(
        "  Entries:   {} ({} discarded, {} errors)",
        result.stats.converted, result.stats.discarded, result.stats.errors
    );
    println!(
        "  Size:      {} bytes ({:.1} KB)",
        bytes.len(),
        bytes.len() as f64 / 1024.0
    );
    println!("  Time:      {:.1}ms", total_time.as_secs_f64() * 1000.0);

    Ok(())
}

/// Reads a compiled document, accepting both plain JSON and the framed
/// binary format.
fn load_store(input: &str) -> Result<RuleStore, String> {
    let bytes = fs::read(input).map_err(|e| format!("Failed to read '{input}': {e}"))?;

    if bytes.first() == Some(&b'[') {
        let json = String::from_utf8(bytes).map_err(|e| format!("Invalid document: {e}"))?;
        return RuleStore::parse(&json).map_err(|e| format!("Invalid document: {e}"));
    }

    let entries = decode_engine(&bytes).map_err(|e| format!("Invalid document: {e}"))?;
    Ok(RuleStore::from_entries(entries))
}

fn cmd_lookup(input: &str, url: &str) -> Result<(), String> {
    let store = load_store(input)?;
    let index = NetworkEngine::new(&store);
    let matcher = Matcher::new(&store, &index);

    let start = Instant::now();
    let candidates = index.lookup(url);
    let payload = matcher.match_url(url);
    let elapsed = start.elapsed();

    println!("Lookup: {url}");
    println!("  Candidates:  {}", candidates.len());
    println!("  Scripts:     {}", payload.scripts.len());
    println!("  Selectors:   {}", payload.css_extended.len());
    println!("  CSS rules:   {}", payload.css_inject.len());
    println!("  Scriptlets:  {}", payload.scriptlets.len());
    println!("  Time:        {:.3}ms", elapsed.as_secs_f64() * 1000.0);

    if !payload.is_empty() {
        let rendered = serde_json::to_string_pretty(&payload)
            .map_err(|e| format!("Failed to render payload: {e}"))?;
        println!("{rendered}");
    }

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let store = load_store(input)?;
    let index = NetworkEngine::new(&store);

    let mut blocks = 0usize;
    let mut exceptions = 0usize;
    let mut cosmetic = 0usize;
    let mut scripted = 0usize;
    for rule in store.iter() {
        match rule.action {
            Action::Block => blocks += 1,
            Action::IgnorePreviousRules => exceptions += 1,
            Action::CssDisplayNone { .. } | Action::CssInject { .. } => cosmetic += 1,
            Action::Script { .. } | Action::Scriptlet { .. } => scripted += 1,
        }
    }

    println!("Document: {input}");
    println!("  Entries:     {}", store.len());
    println!("  Blocking:    {blocks}");
    println!("  Exceptions:  {exceptions}");
    println!("  Cosmetic:    {cosmetic}");
    println!("  Scripted:    {scripted}");
    println!("  Catch-all:   {} entries", index.catch_all_len());

    Ok(())
}
