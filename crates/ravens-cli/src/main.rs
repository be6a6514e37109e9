use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{ChainElement, Interpolation, Transform, TransformChain};
use ravens_engine::DEFAULT_PROFILE;
use ravens_io::{labels, nifti_io, ops};
use ravens_pipeline::{build_projection_chain, project_map, PipelineConfig, RavensPipeline};

#[derive(Parser)]
#[command(name = "ravens")]
#[command(about = "RAVENS tissue-density maps from deformable registration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one subject
    Run {
        /// Subject anatomical scan (subject space)
        #[arg(short, long)]
        input: PathBuf,

        /// Multi-label segmentation of the input (subject space)
        #[arg(short, long)]
        segmentation: PathBuf,

        /// Reference template defining the output grid
        #[arg(short, long)]
        template: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Prefix for every output artifact
        #[arg(short, long)]
        prefix: String,

        /// Registration profile (affine, balanced, accurate, legacy)
        #[arg(long, default_value = DEFAULT_PROFILE)]
        profile: String,

        /// Labels to process (default: every nonzero label present)
        #[arg(short, long, value_delimiter = ',')]
        labels: Option<Vec<u32>>,

        /// Density scaling factor (unit-conversion multiplier)
        #[arg(long, default_value_t = 1000.0)]
        scale: f32,

        /// Worker pool size for the per-label fan-out
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Thread count for external registration processes
        #[arg(long, default_value_t = 1)]
        threads: u32,
    },

    /// Map a template-space map back onto the subject grid
    MapToSubject {
        /// Template-space map to carry back
        #[arg(short, long)]
        map: PathBuf,

        /// Subject-space volume defining the output grid
        #[arg(short, long)]
        subject: PathBuf,

        /// Affine matrix from the registration (applied inverted)
        #[arg(short, long)]
        affine: PathBuf,

        /// Inverse deformation field (applied forward)
        #[arg(short, long)]
        warp: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Interpolation mode (linear, nearest)
        #[arg(long, default_value_t = Interpolation::Linear)]
        interpolation: Interpolation,
    },

    /// Project a volume through an explicit transform chain
    Project {
        /// Volume to project
        #[arg(short, long)]
        map: PathBuf,

        /// Volume defining the output grid
        #[arg(short, long)]
        subject: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Transform specification PATH[,invert], outermost first;
        /// repeat for a chain
        #[arg(short, long = "transform", required = true)]
        transforms: Vec<String>,

        /// Interpolation mode (linear, nearest)
        #[arg(long, default_value_t = Interpolation::Linear)]
        interpolation: Interpolation,
    },

    /// Split a segmentation into per-label binary masks plus a manifest
    CreateLabelMasks {
        /// Multi-label segmentation volume
        #[arg(short, long)]
        segmentation: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Prefix for mask files and the manifest
        #[arg(short, long)]
        prefix: String,

        /// Labels to extract (default: every nonzero label present)
        #[arg(short, long, value_delimiter = ',')]
        labels: Option<Vec<u32>>,
    },

    /// Voxelwise product of two volumes
    Multiply {
        #[arg(short, long)]
        a: PathBuf,

        #[arg(short, long)]
        b: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Rescale and invert intensities within the foreground mask
    InvertIntensity {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Upper bound of the rescaled intensity range
        #[arg(long, default_value_t = 2048)]
        scale_max: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            segmentation,
            template,
            out_dir,
            prefix,
            profile,
            labels,
            scale,
            jobs,
            threads,
        } => {
            let config = PipelineConfig {
                input,
                segmentation,
                template,
                out_dir,
                prefix,
                profile,
                labels,
                scale,
                jobs,
                threads,
            };
            let pipeline = RavensPipeline::from_config(config)?;
            let report = pipeline.run()?;
            info!(
                labels = report.labels.len(),
                executed = report.stages_executed,
                cached = report.cache_hits,
                "run complete"
            );
        }
        Commands::MapToSubject {
            map,
            subject,
            affine,
            warp,
            output,
            interpolation,
        } => {
            map_to_subject(&map, &subject, &affine, &warp, interpolation, &output)?;
        }
        Commands::Project {
            map,
            subject,
            output,
            transforms,
            interpolation,
        } => {
            let engine = default_engine(1);
            let chain = build_projection_chain(&transforms, Template, Subject)?;
            project_map(&engine, &map, &subject, &chain, interpolation, &output)?;
        }
        Commands::CreateLabelMasks {
            segmentation,
            out_dir,
            prefix,
            labels,
        } => {
            create_label_masks(&segmentation, &out_dir, &prefix, labels.as_deref())?;
        }
        Commands::Multiply { a, b, output } => {
            let va = nifti_io::read_volume(&a)?;
            let vb = nifti_io::read_volume(&b)?;
            let product = ops::multiply(&va, &vb)?;
            nifti_io::write_volume(&output, &product)?;
            info!(output = %output.display(), "wrote product volume");
        }
        Commands::InvertIntensity {
            input,
            output,
            scale_max,
        } => {
            let volume = nifti_io::read_volume(&input)?;
            let inverted = ops::invert_intensity(&volume, scale_max)?;
            nifti_io::write_volume(&output, &inverted)?;
            info!(output = %output.display(), "wrote inverted volume");
        }
    }

    Ok(())
}

/// The backend used for standalone resampling, where no profile is in
/// play. The ANTs-style backend handles arbitrary chains.
fn default_engine(threads: u32) -> ravens_engine::AntsEngine {
    ravens_engine::AntsEngine::new(threads)
}

/// Fixed-convention projection back to subject space: the deformation
/// field is the registration's precomputed inverse applied forward, the
/// affine is applied inverted. The two legs are deliberately asymmetric.
fn map_to_subject(
    map: &Path,
    subject: &Path,
    affine: &Path,
    warp: &Path,
    interpolation: Interpolation,
    output: &Path,
) -> Result<()> {
    let chain = TransformChain::new(
        Template,
        Subject,
        vec![
            ChainElement::forward(Transform::dense(warp, Template, Subject)),
            ChainElement::inverted(Transform::linear(affine, Subject, Template)),
        ],
    )?;
    let engine = default_engine(1);
    project_map(&engine, map, subject, &chain, interpolation, output)?;
    info!(output = %output.display(), "wrote subject-space map");
    Ok(())
}

fn create_label_masks(
    segmentation: &Path,
    out_dir: &Path,
    prefix: &str,
    subset: Option<&[u32]>,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let volume = nifti_io::read_volume(segmentation)?;
    let manifest = labels::create_label_masks(&volume, subset, |id| {
        out_dir.join(format!("{prefix}_label_{id}.nii.gz"))
    })?;
    let manifest_path = out_dir.join(format!("{prefix}_labelList.csv"));
    manifest.write(&manifest_path)?;
    info!(
        labels = manifest.len(),
        manifest = %manifest_path.display(),
        "wrote label masks"
    );
    Ok(())
}
