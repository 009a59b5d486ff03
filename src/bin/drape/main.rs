//! Drape CLI - fit clothes and transfer weights from the command line.
//!
//! Usage: drape <COMMAND> [OPTIONS] <MHCLO> ...
//!
//! Run `drape --help` for available commands.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use drape::context::DrapeContext;
use drape::fit::FitOptions;
use drape::host::{fit_clothes, update_delete_group, MemoryMesh};
use drape::io;
use drape::mask::{DeleteGroupOptions, MaskOptions};
use drape::mhclo::{Axis, CorrespondenceDocument};
use drape::weights::{transfer_weights, TransferOptions, WeightBlend, WeightsDocument};

#[derive(Parser)]
#[command(name = "drape")]
#[command(author, version, about = "Clothes fitting CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display MHCLO document information
    Info {
        /// Input MHCLO file
        mhclo: PathBuf,

        /// Mesh metadata file used to name the fitted body part
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Fit an auxiliary mesh onto a base mesh
    Fit {
        /// Input MHCLO file
        mhclo: PathBuf,

        /// Base mesh file, already deformed
        base: PathBuf,

        /// Auxiliary mesh file (default: the document's obj_file)
        #[arg(long)]
        aux: Option<PathBuf>,

        /// Scale factor for axes without a scale anchor
        #[arg(short, long, default_value = "1.0")]
        scale: f64,

        /// Output mesh file
        #[arg(short, long)]
        output: PathBuf,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Transfer bone weights from a base weights file
    Transfer {
        /// Input MHCLO file
        mhclo: PathBuf,

        /// Base mesh weights file
        weights: PathBuf,

        /// Bones to transfer (default: every group in the weights file)
        #[arg(short, long, value_delimiter = ',')]
        bones: Vec<String>,

        /// Drop weights at or below this value
        #[arg(short, long, default_value = "0.001")]
        threshold: f64,

        /// How source contributions are averaged
        #[arg(long, value_enum, default_value = "weighted")]
        blend: Blend,

        /// Output weights file
        #[arg(short, long)]
        output: PathBuf,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Write the base-mesh delete group as a weights file
    Mask {
        /// Input MHCLO file
        mhclo: PathBuf,

        /// Base mesh file
        base: PathBuf,

        /// Group name (default: the document's delete group)
        #[arg(short, long)]
        group: Option<String>,

        /// Output weights file
        #[arg(short, long)]
        output: PathBuf,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Blend {
    /// Barycentric-weighted mean
    Weighted,
    /// Plain mean of the weighted products
    Mean,
}

impl From<Blend> for WeightBlend {
    fn from(blend: Blend) -> Self {
        match blend {
            Blend::Weighted => WeightBlend::Weighted,
            Blend::Mean => WeightBlend::Mean,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { mhclo, metadata } => {
            cmd_info(&mhclo, metadata)?;
        }

        Commands::Fit {
            mhclo,
            base,
            aux,
            scale,
            output,
            sequential,
        } => {
            cmd_fit(&mhclo, &base, aux, scale, &output, sequential)?;
        }

        Commands::Transfer {
            mhclo,
            weights,
            bones,
            threshold,
            blend,
            output,
            sequential,
        } => {
            cmd_transfer(&mhclo, &weights, bones, threshold, blend, &output, sequential)?;
        }

        Commands::Mask {
            mhclo,
            base,
            group,
            output,
            sequential,
        } => {
            cmd_mask(&mhclo, &base, group, &output, sequential)?;
        }
    }

    Ok(())
}

fn cmd_info(mhclo: &Path, metadata: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let doc = CorrespondenceDocument::load(mhclo)?;

    println!("File: {}", mhclo.display());
    for (key, value) in doc.metadata_properties() {
        println!("{}: {}", key, value);
    }
    if let Some(path) = doc.source_mesh_path() {
        println!("Mesh: {}", path.display());
    }
    if let Some(path) = doc.material_path() {
        println!("Material: {}", path.display());
    }
    println!("Vertex references: {}", doc.vertex_refs().len());
    if doc.has_delete_group() {
        println!("Delete indices: {}", doc.delete_index_set().len());
    }

    for axis in Axis::ALL {
        if let Some(anchor) = doc.scale_anchors().get(axis) {
            println!(
                "{}: vertices {} and {}, divisor {}",
                axis.scale_key(),
                anchor.index_a,
                anchor.index_b,
                anchor.divisor
            );
        }
    }

    if let Some(path) = metadata {
        let mut ctx = DrapeContext::new().with_metadata_path(path);
        match ctx.detect_body_part(&doc)? {
            Some(part) => println!("Body part: {}", part),
            None => println!("Body part: unknown"),
        }
    }

    for warning in doc.warnings() {
        println!("Warning: {}", warning);
    }

    Ok(())
}

fn cmd_fit(
    mhclo: &Path,
    base: &Path,
    aux: Option<PathBuf>,
    scale: f64,
    output: &Path,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut doc = CorrespondenceDocument::load(mhclo)?;
    let aux = match aux {
        Some(path) => path,
        None => doc
            .source_mesh_path()
            .map(Path::to_path_buf)
            .ok_or("document has no obj_file; pass --aux")?,
    };

    let base = MemoryMesh::new("base", io::load(base)?);
    let mut clothes = MemoryMesh::new(doc.name(), io::load(&aux)?);
    // Mismatches are logged and recorded on the document.
    doc.validate_vertex_count(clothes.mesh().num_vertices());

    let options = FitOptions::default()
        .with_fallback_scale(scale)
        .with_parallel(!sequential);

    let start = Instant::now();
    let report = fit_clothes(&doc, &base, &mut clothes, &options)?;
    let elapsed = start.elapsed();

    println!(
        "Sizes: x={:.4} y={:.4} z={:.4}",
        report.sizes[0], report.sizes[1], report.sizes[2]
    );
    if !report.skipped.is_empty() {
        println!("Skipped: {} vertices", report.skipped.len());
    }

    io::save(clothes.mesh(), output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_transfer(
    mhclo: &Path,
    weights: &Path,
    bones: Vec<String>,
    threshold: f64,
    blend: Blend,
    output: &Path,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = CorrespondenceDocument::load(mhclo)?;
    let base = WeightsDocument::load(weights)?.to_bone_weights()?;

    let skeleton: BTreeSet<String> = if bones.is_empty() {
        base.group_names()
    } else {
        bones.into_iter().collect()
    };

    let options = TransferOptions::default()
        .with_threshold(threshold)
        .with_blend(blend.into())
        .with_parallel(!sequential);

    let start = Instant::now();
    let groups = transfer_weights(&doc, &base, &skeleton, &options);
    let elapsed = start.elapsed();

    println!("Groups: {}", groups.len());
    WeightsDocument::from_groups(groups.values()).save(output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_mask(
    mhclo: &Path,
    base: &Path,
    group: Option<String>,
    output: &Path,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = CorrespondenceDocument::load(mhclo)?;
    let mut base = MemoryMesh::new("base", io::load(base)?);

    let mut options = DeleteGroupOptions {
        mask: MaskOptions::default().with_parallel(!sequential),
        ..DeleteGroupOptions::default()
    };
    if let Some(name) = group {
        options = options.with_group_name(name);
    }

    let mut ctx = DrapeContext::new();
    let Some(outcome) = update_delete_group(&mut ctx, &doc, &mut base, true, &options)? else {
        println!("{} has no delete listing", mhclo.display());
        return Ok(());
    };

    println!("Group {}: {} vertices", outcome.group_name, outcome.vertices);
    let groups = base.groups();
    WeightsDocument::from_groups(groups.values()).save(output)?;
    println!("Saved: {}", output.display());

    Ok(())
}
