// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-sift CLI
//!
//! Command-line interface for VCF expression filtering and database annotation.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use ferro_sift::annotate::AnnotationEngine;
use ferro_sift::cli::{open_database, output_writer, run_annotate, run_filter};
use ferro_sift::config::{AnnotateOverrides, SiftConfig};
use ferro_sift::filter::{load_set_file, VcfFilter};
use ferro_sift::vcf::{open_vcf, EffectFormat};
use ferro_sift::SiftError;
use tracing::debug;

#[derive(Parser)]
#[command(name = "ferro-sift")]
#[command(author, version, about = "VCF expression filter and database annotator")]
#[command(
    long_about = "Filter VCF records with expressions and annotate them from sorted databases.

Examples:
  ferro-sift filter '(QUAL > 30) & (DP >= 10)' -i input.vcf
  ferro-sift filter \"ANN[*].GENE in SET[0]\" --set genes.txt -i input.vcf
  ferro-sift annotate --db dbNSFP.txt.gz -i input.vcf -o annotated.vcf -f SIFT_pred,GERP++_RS"
)]
struct Cli {
    /// Log level or filter directive
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Configuration file (defaults to .ferro-sift.toml or ~/.config/ferro/sift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the VCF records matching an expression
    Filter {
        /// Filter expression
        expression: String,

        /// Input VCF file (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output VCF file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Set file, addressed as SET[n] in load order
        #[arg(long = "set")]
        sets: Vec<PathBuf>,

        /// Effect list layout (ann or eff)
        #[arg(long)]
        format: Option<String>,

        /// Keep the records that do not match
        #[arg(long)]
        inverse: bool,

        /// Keep every record and add NAME to FILTER of matching ones
        #[arg(long, value_name = "NAME")]
        add_filter: Option<String>,
    },

    /// Annotate VCF records from a position-sorted database
    Annotate {
        /// Database file (tabix-indexed .gz or plain text)
        #[arg(long)]
        db: PathBuf,

        /// Input VCF file (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output VCF file (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Comma-separated database fields to add
        #[arg(short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// Write '.' for missing values
        #[arg(short = 'a', long)]
        annotate_empty: bool,

        /// Collapse repeated values
        #[arg(long, overrides_with = "no_collapse")]
        collapse: bool,

        /// Keep repeated values
        #[arg(long, overrides_with = "collapse")]
        no_collapse: bool,

        /// Minimum gap before seeking in the database
        #[arg(long)]
        min_jump: Option<u64>,

        /// Prefix for added INFO keys
        #[arg(long)]
        prefix: Option<String>,

        /// Accept a compressed database without a tabix index
        #[arg(long)]
        no_index_check: bool,

        /// Write run statistics as JSON
        #[arg(long)]
        stats: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    if let Err(e) = run(cli) {
        eprintln!(
            "Error: {}",
            e.downcast_ref::<SiftError>()
                .map(SiftError::detailed_message)
                .unwrap_or_else(|| e.to_string())
        );
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => SiftConfig::load_from_path(path).map_err(SiftError::from)?,
        None => SiftConfig::load().unwrap_or_default(),
    };

    match cli.command {
        Commands::Filter {
            expression,
            input,
            output,
            sets,
            format,
            inverse,
            add_filter,
        } => {
            let format = format.map(|f| f.parse::<EffectFormat>()).transpose()?;
            let format = config.effect_format(format)?;
            let sets = sets.iter().map(load_set_file).collect::<Result<Vec<_>, _>>()?;

            let filter = VcfFilter::parse(&expression, sets, format)?
                .with_inverse(inverse)
                .with_add_filter(add_filter);
            debug!("Filter expression: {}", filter.expression());

            let reader = open_vcf(&input)?;
            run_filter(reader, output_writer(output.as_deref())?, &filter)?;
        }

        Commands::Annotate {
            db,
            input,
            output,
            fields,
            annotate_empty,
            collapse,
            no_collapse,
            min_jump,
            prefix,
            no_index_check,
            stats,
        } => {
            let overrides = AnnotateOverrides {
                fields,
                annotate_empty,
                collapse: match (collapse, no_collapse) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                min_jump,
                prefix,
            };
            let settings = config.merge_with_cli(&overrides);

            let database = open_database(&db, !no_index_check)?;
            let mut engine = AnnotationEngine::new(database, settings)?;

            let reader = open_vcf(&input)?;
            let summary = run_annotate(reader, output_writer(output.as_deref())?, &mut engine)?;

            if let Some(path) = stats {
                write_stats(&path, &summary)?;
            }
        }
    }

    Ok(())
}

fn write_stats<T: serde::Serialize>(path: &Path, stats: &T) -> Result<(), SiftError> {
    let file = File::create(path).map_err(|e| SiftError::Io {
        msg: format!("Failed to create '{}': {}", path.display(), e),
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), stats)?;
    Ok(())
}

/// Initialize tracing/logging on stderr
fn init_tracing(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_new(level).map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
