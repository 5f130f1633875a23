use crate::config::Config;
use crate::extractor::classify::DetectionRules;
use crate::extractor::go::GoExtractor;
use crate::extractor::ScanResult;
use crate::filter::{ensure_ignore_file, IgnoreFileStatus, IgnoreFilter};
use crate::generator::dependencies::DependencyGenerator;
use crate::generator::is_generated;
use crate::generator::routes::RouteGenerator;
use crate::scanner::Scanner;
use crate::serializer::{render_text, serialize_json, serialize_yaml, write_to_file, ScanReport};
use crate::validator::{validate_scan_result, ValidationResult};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// wiregen - Generate Fiber route registration and Wire provider sets from Go sources
#[derive(Parser, Debug)]
#[command(name = "wiregen")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (defaults to ./wiregen.yaml)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan the project and report handlers, routes, providers, and findings
    Scan {
        /// Report format
        #[arg(short = 'f', long = "format", value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Scan, validate, and write the generated Go files
    Generate {
        /// Which files to generate
        #[arg(value_enum, default_value = "all")]
        target: GenerateTarget,

        /// Generate even when validation reports errors
        #[arg(long = "force")]
        force: bool,
    },
    /// Write the default ignore file if it is missing
    InitIgnore {
        /// Append built-in patterns missing from an existing file
        #[arg(long = "merge")]
        merge: bool,
    },
    /// Remove generated files
    Clean,
}

/// Report format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum GenerateTarget {
    /// Route registration file only
    Routes,
    /// Provider set file only
    Deps,
    /// Both files
    All,
}

impl GenerateTarget {
    fn routes(self) -> bool {
        matches!(self, GenerateTarget::Routes | GenerateTarget::All)
    }

    fn dependencies(self) -> bool {
        matches!(self, GenerateTarget::Deps | GenerateTarget::All)
    }
}

/// Files written by one `generate` run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub routes_file: Option<PathBuf>,
    pub dependencies_file: Option<PathBuf>,
}

/// Log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if let Some(ref config) = args.config {
        if !config.is_file() {
            anyhow::bail!("Config file does not exist: {}", config.display());
        }
        info!("Config file: {}", config.display());
    }

    Ok(args)
}

/// Run the selected subcommand
pub fn run(args: CliArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    info!("Project root: {}", config.project.root.display());

    match args.command {
        Command::Scan { format, output } => {
            let report = run_scan(&config, format)?;
            match output {
                Some(path) => {
                    write_to_file(&report, &path)?;
                    info!("Report written to {}", path.display());
                }
                None => print!("{}", report),
            }
        }
        Command::Generate { target, force } => {
            let outcome = run_generate(&config, target, force)?;
            for path in [&outcome.routes_file, &outcome.dependencies_file]
                .into_iter()
                .flatten()
            {
                println!("Generated {}", path.display());
            }
        }
        Command::InitIgnore { merge } => {
            let path = config.ignore_file();
            match ensure_ignore_file(&path, merge)? {
                IgnoreFileStatus::Created => info!("Created {}", path.display()),
                IgnoreFileStatus::Unchanged => info!("{} is up to date", path.display()),
                IgnoreFileStatus::Merged(count) => {
                    info!("Added {} patterns to {}", count, path.display())
                }
            }
        }
        Command::Clean => {
            for path in run_clean(&config)? {
                println!("Removed {}", path.display());
            }
        }
    }

    Ok(())
}

/// Builds the scanner described by the configuration
fn build_scanner(config: &Config) -> Result<Scanner> {
    let extractor = GoExtractor::new(DetectionRules::default())?;
    let filter = IgnoreFilter::load(&config.ignore_file())?;
    Ok(Scanner::new(extractor, filter).workers(config.scan.workers))
}

/// Scans every configured root and validates the result
fn scan_and_validate(config: &Config) -> Result<(ScanResult, ValidationResult)> {
    let scanner = build_scanner(config)?;
    let scan_dirs = config.scan_dirs();

    info!("Scanning {} directories...", scan_dirs.len());
    let result = scanner.scan_all(&scan_dirs)?;
    info!(
        "Found {} handlers, {} routes, {} providers",
        result.handlers.len(),
        result.routes.len(),
        result.providers.len()
    );
    for scan_error in &result.errors {
        warn!(
            "Skipped {} ({}): {}",
            scan_error.source_file.display(),
            scan_error.kind,
            scan_error.message
        );
    }

    let validation = validate_scan_result(&result, &DetectionRules::default().handler_suffix);
    Ok((result, validation))
}

/// Renders the scan report in the requested format
pub fn run_scan(config: &Config, format: OutputFormat) -> Result<String> {
    let (result, validation) = scan_and_validate(config)?;
    let report = ScanReport::new(&result, &validation);

    match format {
        OutputFormat::Text => Ok(render_text(&report)),
        OutputFormat::Yaml => serialize_yaml(&report),
        OutputFormat::Json => serialize_json(&report),
    }
}

/// Scans, validates, and writes the generated files.
///
/// # Errors
///
/// Fails without writing anything when validation reports errors and `force` is not set,
/// or when no module path is known.
pub fn run_generate(
    config: &Config,
    target: GenerateTarget,
    force: bool,
) -> Result<GenerateOutcome> {
    let settings = config.generator_settings()?;
    let (result, validation) = scan_and_validate(config)?;

    for issue in &validation.warnings {
        warn!("{}", issue);
    }
    for issue in &validation.errors {
        error!("{}", issue);
    }
    if validation.has_errors() {
        if !force {
            anyhow::bail!(
                "Validation failed with {} errors; fix them or rerun with --force",
                validation.errors.len()
            );
        }
        warn!(
            "Generating despite {} validation errors",
            validation.errors.len()
        );
    }

    let formatter = config.generation.formatter.formatter();
    let handler_suffix = DetectionRules::default().handler_suffix;
    let mut outcome = GenerateOutcome::default();

    let routes = &config.generation.routes;
    if target.routes() && routes.enabled {
        if result.routes.is_empty() {
            info!("No routes found, skipping {}", routes.output_file);
        } else {
            let generator = RouteGenerator::new(settings.clone(), routes.output_file.as_str())
                .with_handler_suffix(handler_suffix);
            outcome.routes_file =
                Some(generator.generate(&result.handlers, &result.routes, formatter.as_ref())?);
        }
    }

    let dependencies = &config.generation.dependencies;
    if target.dependencies() && dependencies.enabled {
        if result.providers.is_empty() {
            info!("No providers found, skipping {}", dependencies.output_file);
        } else {
            let generator = DependencyGenerator::new(settings, dependencies.output_file.as_str());
            outcome.dependencies_file =
                Some(generator.generate(&result.providers, formatter.as_ref())?);
        }
    }

    Ok(outcome)
}

/// Removes the configured output files that carry the generated marker
pub fn run_clean(config: &Config) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for file_name in [
        &config.generation.routes.output_file,
        &config.generation.dependencies.output_file,
    ] {
        let path = config.output_path(file_name);
        if remove_if_generated(&path)? {
            removed.push(path);
        }
    }

    Ok(removed)
}

fn remove_if_generated(path: &Path) -> Result<bool> {
    if !path.is_file() {
        debug!("{} does not exist", path.display());
        return Ok(false);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    if !is_generated(&content) {
        warn!("{} was not generated by wiregen, leaving it", path.display());
        return Ok(false);
    }

    fs::remove_file(path).with_context(|| format!("Failed to remove file: {}", path.display()))?;
    Ok(true)
}
