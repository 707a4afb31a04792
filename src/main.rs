use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;

mod config;
mod domain;
mod geometry;
mod graph;
mod mesh;
mod project;
mod scan;
mod skeleton;

use config::FileConfig;
use graph::establish_connectivity_graph;
use mesh::{generate_branch_mesh, write_obj};
use project::Session;
use scan::{DEFAULT_IMPORT_SCALE, import_graph};
use skeleton::build_tree_structure;

/// Reconstruct a 3D tree mesh from a scanned branch-graph YAML file
///
/// Examples:
///   # Convert a scan with default settings (writes out.obj in the cwd)
///   treemesh RealWalnut_5001.yml
///
///   # Custom output path and import scale
///   treemesh scan.yml -o walnut.obj --scale 0.05
///
///   # Use a config file for reconstruction tuning
///   treemesh scan.yml --config my-settings.toml
#[derive(Parser, Debug)]
#[command(name = "treemesh")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input YAML tree scan (optional if set in a config file)
    input: Option<PathBuf>,

    /// Path to config file (optional, auto-searches treemesh.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output OBJ file path, relative paths resolve against the cwd
    #[arg(short = 'o', long, default_value = "out.obj")]
    output: PathBuf,

    /// Scale applied to imported positions and radii
    #[arg(short = 's', long, default_value = "0.1")]
    scale: f32,

    /// Project scratch directory (defaults to Temp/treemesh.proj under the cwd)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let file_config = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            Some(toml::from_str(&contents).context("Failed to parse config file")?)
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load()
    };

    let input = args
        .input
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.input.clone()));
    let output = if args.output != PathBuf::from("out.obj") {
        args.output.clone()
    } else {
        file_config
            .as_ref()
            .and_then(|c| c.output.clone())
            .unwrap_or_else(|| PathBuf::from("out.obj"))
    };
    let scale = if (args.scale - DEFAULT_IMPORT_SCALE).abs() > 1e-6 {
        args.scale
    } else {
        file_config
            .as_ref()
            .map(|c| c.scale)
            .unwrap_or(DEFAULT_IMPORT_SCALE)
    };
    let verbose = args.verbose || file_config.as_ref().map(|c| c.verbose).unwrap_or(false);
    let project = args
        .project
        .clone()
        .or_else(|| file_config.as_ref().and_then(|c| c.project.clone()));

    let graph_settings = file_config
        .as_ref()
        .and_then(|c| c.graph.clone())
        .unwrap_or_default();
    let reconstruction_settings = file_config
        .as_ref()
        .and_then(|c| c.reconstruction.clone())
        .unwrap_or_default();
    let mesh_settings = file_config
        .as_ref()
        .and_then(|c| c.mesh.clone())
        .unwrap_or_default();

    let Some(input) = input else {
        bail!("Must provide an input YAML scan, either as an argument or in a config file");
    };

    println!("treemesh - Tree Scan OBJ Generator");
    println!("==================================");
    println!();

    if verbose {
        println!("Configuration:");
        println!("  Input: {}", input.display());
        println!("  Output: {}", output.display());
        println!("  Import scale: {}", scale);
        println!("  Internode length: {}m", reconstruction_settings.internode_length);
        println!("  Radial segments: {}", mesh_settings.radial_segments);
        println!();
    }

    let project_path = match project {
        Some(path) => path,
        None => Session::default_project_path()?,
    };
    let _session = Session::start_windowless(&project_path)
        .context("Failed to start project session")?;
    if verbose {
        println!("  Project: {}", project_path.display());
        println!();
    }

    let spinner = create_spinner("Importing tree scan...");
    let start = Instant::now();
    let mut cloud = import_graph(&input, scale).context("Failed to import tree scan")?;
    spinner.finish_with_message(format!(
        "Imported {} branches, {} scatter points, {} allocated points [{:.1}s]",
        cloud.branches.len(),
        cloud.scattered_points.len(),
        cloud.allocated_points.len(),
        start.elapsed().as_secs_f32()
    ));
    if cloud.branches.is_empty() {
        bail!("No branches found in {}", input.display());
    }

    let spinner = create_spinner("Establishing connectivity graph...");
    let start = Instant::now();
    let summary = establish_connectivity_graph(&mut cloud, &graph_settings)
        .context("Failed to establish connectivity graph")?;
    spinner.finish_with_message(format!(
        "Linked {} scatter pairs, {} branch candidates, {} parent edges [{:.1}s]",
        summary.scatter_links,
        summary.branch_candidate_links,
        summary.parent_links,
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Building tree structure...");
    let start = Instant::now();
    let skeletons = build_tree_structure(&mut cloud, &reconstruction_settings)
        .context("Failed to build tree structure")?;
    let node_count: usize = skeletons.iter().map(|s| s.len()).sum();
    spinner.finish_with_message(format!(
        "Built {} tree(s) with {} internodes [{:.1}s]",
        skeletons.len(),
        node_count,
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Generating branch meshes...");
    let start = Instant::now();
    let meshes: Vec<mesh::Mesh> = skeletons
        .iter()
        .map(|skeleton| generate_branch_mesh(skeleton, &mesh_settings))
        .collect();
    let vertex_count: usize = meshes.iter().map(|m| m.vertex_count()).sum();
    let triangle_count: usize = meshes.iter().map(|m| m.triangle_count()).sum();
    if meshes.iter().all(|m| m.is_empty()) {
        spinner.finish_and_clear();
        bail!("Reconstruction produced no geometry");
    }
    if verbose {
        for (i, mesh) in meshes.iter().enumerate() {
            println!("  Tree {}: {} triangles", i, mesh.triangle_count());
        }
    }
    spinner.finish_with_message(format!(
        "Generated {} vertices, {} triangles [{:.1}s]",
        vertex_count,
        triangle_count,
        start.elapsed().as_secs_f32()
    ));

    let spinner = create_spinner("Writing OBJ file...");
    let start = Instant::now();
    write_obj(&output, &meshes).context("Failed to write OBJ file")?;
    spinner.finish_with_message(format!(
        "Wrote {} [{:.1}s]",
        output.display(),
        start.elapsed().as_secs_f32()
    ));

    println!();
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    println!();
    println!("Output: {}", output.display());

    Ok(())
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
