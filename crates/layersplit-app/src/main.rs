//! layersplit 命令行入口
//!
//! 把一个 DXF 图纸按图层拆分为目标目录中的多个 DXF 文件。

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use layersplit_core::prelude::*;
use layersplit_file::DxfEngine;

#[derive(Parser)]
#[command(name = "layersplit")]
#[command(about = "Split a CAD drawing into one dataset per layer", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the layers found in a drawing
    List {
        /// Source drawing (.dxf)
        source: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,
    },

    /// Export every layer to its own dataset
    Export {
        /// Source drawing (.dxf)
        source: PathBuf,

        /// Destination directory (created if missing)
        destination: PathBuf,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        options: ExportArgs,

        /// Stop at the first failed layer
        #[arg(long)]
        fail_fast: bool,

        /// Number of layers exported in parallel
        #[arg(long)]
        jobs: Option<usize>,
    },

    /// Export a single layer
    Layer {
        /// Source drawing (.dxf)
        source: PathBuf,

        /// Raw layer name, matched exactly
        layer: String,

        /// Destination directory (created if missing)
        destination: PathBuf,

        /// Output dataset name (only when the layer exists in one geometry type)
        #[arg(long, conflicts_with = "report")]
        output_name: Option<String>,

        /// Succeed without exporting when the layer does not exist
        #[arg(long)]
        ignore_missing: bool,

        #[command(flatten)]
        geometry: GeometryArgs,

        #[command(flatten)]
        options: ExportArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GeometryArg {
    Point,
    Line,
    Polygon,
}

impl From<GeometryArg> for GeometryKind {
    fn from(arg: GeometryArg) -> Self {
        match arg {
            GeometryArg::Point => GeometryKind::Point,
            GeometryArg::Line => GeometryKind::Line,
            GeometryArg::Polygon => GeometryKind::Polygon,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamingArg {
    /// Replace dashes with underscores only
    Conservative,
    /// Full name validation and de-duplication against the destination
    Validated,
}

impl From<NamingArg> for NamingPolicy {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Conservative => NamingPolicy::Conservative,
            NamingArg::Validated => NamingPolicy::Validated,
        }
    }
}

#[derive(Args)]
struct GeometryArgs {
    /// Restrict to these geometry types (default: point, line and polygon)
    #[arg(long = "geometry", value_enum)]
    kinds: Vec<GeometryArg>,
}

impl GeometryArgs {
    fn source(&self, path: &Path) -> SourceRef {
        SourceRef::with_kinds(
            path.to_string_lossy(),
            self.kinds.iter().copied().map(GeometryKind::from),
        )
    }
}

#[derive(Args)]
struct ExportArgs {
    /// JSON export configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output naming policy
    #[arg(long, value_enum)]
    naming: Option<NamingArg>,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl ExportArgs {
    fn load_config(&self) -> Result<ExportConfig> {
        let mut config = match &self.config {
            Some(path) => ExportConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ExportConfig::default(),
        };
        if let Some(naming) = self.naming {
            config.naming = naming.into();
        }
        Ok(config)
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish(),
    )?;
    Ok(())
}

fn destination(path: &Path) -> Result<DestinationRef> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create destination {}", path.display()))?;
    Ok(DestinationRef::new(path.to_string_lossy()))
}

fn write_report(report: &BatchReport, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        std::fs::write(path, report.to_json_pretty()?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn finish(report: &BatchReport, report_path: Option<&Path>) -> Result<()> {
    println!("{}", report.summary());
    write_report(report, report_path)?;
    if !report.failures.is_empty() {
        bail!("{} of {} layers failed to export", report.failures.len(), report.attempted);
    }
    Ok(())
}

fn list(source: &SourceRef) -> Result<()> {
    let catalog = LayerCatalog::build(&DxfEngine::new(), source)?;
    for entry in catalog.iter() {
        println!("{}\t{}\t{}", entry.kind(), entry.name(), entry.candidate_name());
    }
    if catalog.excluded_nulls() > 0 {
        eprintln!("{} records without a layer were skipped", catalog.excluded_nulls());
    }
    Ok(())
}

fn export(source: &SourceRef, destination: &DestinationRef, config: ExportConfig, report_path: Option<&Path>) -> Result<()> {
    let report = split_all(&DxfEngine::new(), source, destination, config, CancellationToken::new())?;
    finish(&report, report_path)
}

fn export_layer(
    source: &SourceRef,
    layer: &str,
    destination: &DestinationRef,
    output_name: Option<&str>,
    config: ExportConfig,
    report_path: Option<&Path>,
) -> Result<()> {
    let engine = DxfEngine::new();

    let Some(output_name) = output_name else {
        let report = split_layers(&engine, source, &[layer], destination, config, CancellationToken::new())?;
        return finish(&report, report_path);
    };

    let catalog = LayerCatalog::build(&engine, source)?;
    let entry = match catalog.find(layer).as_slice() {
        [entry] => *entry,
        [] if config.missing_layer == MissingLayerPolicy::Ignore => {
            println!("Layer '{}' not found, nothing exported", layer);
            return Ok(());
        }
        [] => return Err(LayerNotFoundError { layer: layer.to_string() }.into()),
        entries => bail!(
            "Layer '{}' exists in {} geometry types; use --geometry to pick one",
            layer,
            entries.len()
        ),
    };

    let outcome = Exporter::new(&engine, config).export_one(entry, destination, Some(output_name))?;
    println!(
        "Exported layer '{}' ({}) as {} ({} records)",
        outcome.layer, outcome.kind, outcome.output_name, outcome.records
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    init_logging(cli.verbose)?;

    match cli.command {
        Command::List { source, geometry } => list(&geometry.source(&source)),

        Command::Export {
            source,
            destination: dest,
            geometry,
            options,
            fail_fast,
            jobs,
        } => {
            let mut config = options.load_config()?;
            if fail_fast {
                config.on_error = BatchPolicy::FailFast;
            }
            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }
            info!("Splitting {} into {}", source.display(), dest.display());
            export(&geometry.source(&source), &destination(&dest)?, config, options.report.as_deref())
        }

        Command::Layer {
            source,
            layer,
            destination: dest,
            output_name,
            ignore_missing,
            geometry,
            options,
        } => {
            let mut config = options.load_config()?;
            if ignore_missing {
                config.missing_layer = MissingLayerPolicy::Ignore;
            }
            export_layer(
                &geometry.source(&source),
                &layer,
                &destination(&dest)?,
                output_name.as_deref(),
                config,
                options.report.as_deref(),
            )
        }
    }
}
