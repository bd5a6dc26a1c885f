//! Command-line front end for ingram.
//!
//! Usage:
//!   ingram compile `<grammars|dirs>...` [-o `<bundle>`]       - Compile grammars, optionally persist them
//!   ingram parse --grammar `<g>`... `<input>`                  - Compile and parse in one go
//!   ingram parse --bundle `<bundle>` `<input>`                 - Parse with a persisted recognizer
//!   ingram inspect `<bundle>`                                 - Show the manifest of a persisted bundle

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ingram::persist;
use ingram::tool::GRAMMAR_EXTENSION;
use ingram::{
    CaseFolding, GenericParser, GrammarSource, ParseOptions, ParseTree, ParserConfig,
    ParserSettings, PersistedBundle,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "ingram", version)]
#[command(about = "Compile grammars into in-memory recognizers and parse with them")]
struct Cli {
    /// Settings document applied before command-line overrides
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile grammar files and optionally persist the recognizer
    Compile {
        /// Grammar files or directories containing them
        #[arg(required = true)]
        grammars: Vec<PathBuf>,

        /// Write the compiled recognizer to this bundle file
        #[arg(short, long, value_name = "BUNDLE")]
        output: Option<PathBuf>,

        /// Overwrite an existing bundle file
        #[arg(long)]
        force: bool,

        /// Package prefix for generated unit names
        #[arg(long)]
        package: Option<String>,

        /// Utility unit source compiled alongside the grammar
        #[arg(long = "utility", value_name = "FILE")]
        utilities: Vec<PathBuf>,

        /// Export the generated unit sources to this directory
        #[arg(long, value_name = "DIR")]
        emit_dir: Option<PathBuf>,
    },

    /// Parse an input file and print its tree
    Parse {
        /// Grammar files or directories to compile before parsing
        #[arg(long = "grammar", value_name = "PATH", conflicts_with = "bundle", required_unless_present = "bundle")]
        grammars: Vec<PathBuf>,

        /// Persisted bundle to parse with
        #[arg(long, value_name = "BUNDLE")]
        bundle: Option<PathBuf>,

        /// Entry rule; defaults to the configured or first rule
        #[arg(long)]
        rule: Option<String>,

        /// Case folding applied to the lexer view
        #[arg(long = "case", value_name = "none|upper|lower")]
        case_folding: Option<CaseFolding>,

        #[arg(long, value_enum, default_value_t = Format::Tree)]
        format: Format,

        /// Input file
        input: PathBuf,
    },

    /// Show the manifest of a persisted bundle
    Inspect {
        bundle: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Tree,
    Dot,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Compile {
            grammars,
            output,
            force,
            package,
            utilities,
            emit_dir,
        } => {
            let mut config = config;
            if let Some(package) = package {
                config = config.package(package);
            }
            for utility in &utilities {
                config = config
                    .utility_file(utility)
                    .with_context(|| format!("Failed to read utility {}", utility.display()))?;
            }
            handle_compile(&grammars, config, output.as_deref(), force, emit_dir.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Parse {
            grammars,
            bundle,
            rule,
            case_folding,
            format,
            input,
        } => {
            let mut options = ParseOptions::new();
            options.entry_rule = rule;
            options.case_folding = case_folding;
            handle_parse(&grammars, bundle.as_deref(), config, &options, format, &input)
        }
        Command::Inspect { bundle } => {
            handle_inspect(&bundle)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ParserConfig> {
    match path {
        Some(path) => {
            let settings = ParserSettings::from_file(path)
                .with_context(|| format!("Failed to load settings {}", path.display()))?;
            Ok(settings.into_config()?)
        }
        None => Ok(ParserConfig::default()),
    }
}

/// Expand directories into the grammar files below them
fn grammar_source(paths: &[PathBuf]) -> Result<GrammarSource> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == GRAMMAR_EXTENSION))
                .collect();
            found.sort();
            debug!("found {} grammar file(s) under {}", found.len(), path.display());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        bail!("No grammar files found");
    }
    GrammarSource::from_files(&files).context("Failed to read grammar files")
}

fn handle_compile(
    grammars: &[PathBuf],
    config: ParserConfig,
    output: Option<&Path>,
    force: bool,
    emit_dir: Option<&Path>,
) -> Result<()> {
    let mut parser = GenericParser::from_source(grammar_source(grammars)?, config);
    parser.compile()?;

    for warning in parser.warnings() {
        eprintln!("warning: {}", warning);
    }
    if let Some(units) = parser.compiled_units() {
        println!(
            "Compiled {} bundle(s), {} unit(s), {} bytes",
            units.len(),
            units.unit_count(),
            units.total_size()
        );
    }
    if let Some(dir) = emit_dir {
        let written = parser.write_generated_sources(dir)?;
        println!("Wrote {} generated source(s) to {}", written.len(), dir.display());
    }
    if let Some(path) = output {
        parser
            .store(path, force)
            .with_context(|| format!("Failed to write bundle {}", path.display()))?;
        println!("Stored recognizer in {}", path.display());
    }
    Ok(())
}

fn handle_parse(
    grammars: &[PathBuf],
    bundle: Option<&Path>,
    config: ParserConfig,
    options: &ParseOptions,
    format: Format,
    input: &Path,
) -> Result<ExitCode> {
    let mut parser = match bundle {
        Some(path) => {
            let bundle = PersistedBundle::read_from(path)
                .with_context(|| format!("Failed to read bundle {}", path.display()))?;
            GenericParser::from_persisted(&bundle, config)?
        }
        None => {
            let mut parser = GenericParser::from_source(grammar_source(grammars)?, config);
            parser.compile()?;
            parser
        }
    };

    let result = parser.parse_file(input, options)?;
    info!("parsed {} with rule {}", input.display(), result.entry_rule);
    for diagnostic in &result.diagnostics {
        eprintln!("{}: {}", input.display(), diagnostic);
    }

    if let Some(tree) = parser.parse_tree() {
        println!("{}", render(tree, format)?);
    }
    if result.has_errors() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn render(tree: &ParseTree, format: Format) -> Result<String> {
    Ok(match format {
        Format::Tree => tree.to_string_tree(),
        Format::Dot => tree.to_dot(),
        Format::Json => serde_json::to_string_pretty(&tree.to_json())?,
    })
}

fn handle_inspect(path: &Path) -> Result<()> {
    let bundle = PersistedBundle::read_from(path)
        .with_context(|| format!("Failed to read bundle {}", path.display()))?;
    let manifest = persist::read_manifest(&bundle)?;
    let metadata = &manifest.metadata;

    println!("Grammar:   {} ({})", metadata.grammar_name, metadata.grammar_files.join(", "));
    println!("Created:   {} by {}", manifest.created_at, manifest.generator);
    println!("Format:    v{}", manifest.format_version);
    println!("Lexer:     {}", metadata.lexer.as_deref().unwrap_or("-"));
    println!("Parser:    {}", metadata.parser.as_deref().unwrap_or("-"));
    println!("Entry:     {}", metadata.entry_rule.as_deref().unwrap_or("-"));
    println!("Folding:   {}", metadata.case_folding);
    println!("\n{} bundle(s), {} bytes:", manifest.bundles.len(), manifest.total_size());
    for record in &manifest.bundles {
        println!(
            "  {} [{:?}] primary #{} + {} inner unit(s)",
            record.primary,
            record.origin,
            record.primary_unit,
            record.inner_units.len()
        );
    }
    Ok(())
}
