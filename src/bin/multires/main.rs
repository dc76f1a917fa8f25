//! Multires CLI - build multiresolution levels from the command line.
//!
//! Usage: multires <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `multires --help` for available commands. Set `RUST_LOG=multires=debug`
//! to trace level operations.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use multires::io;
use multires::mesh::{Mesh, Session};
use multires::multires::{Connectivity, MultiresHierarchy, SubdivisionKind};
use multires::subsurf::{CatmullClarkEvaluator, DerivedMesh, MultiresModifier, SubsurfEvaluator};

#[derive(Parser)]
#[command(name = "multires")]
#[command(author, version, about = "Multiresolution mesh CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,
    },

    /// Add multires levels and write one of them
    Subdivide {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Number of levels to add
        #[arg(short = 'n', long, default_value = "1")]
        levels: usize,

        /// Subdivision rules
        #[arg(short, long, value_enum, default_value = "catmull-clark")]
        kind: Kind,

        /// Level to write (default: the finest)
        #[arg(short, long)]
        level: Option<usize>,

        /// Store levels as displacement grids instead of explicit levels
        #[arg(long)]
        grids: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Kind {
    /// Catmull-Clark smoothing
    CatmullClark,
    /// Midpoint insertion without smoothing
    Simple,
}

impl From<Kind> for SubdivisionKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::CatmullClark => SubdivisionKind::CatmullClark,
            Kind::Simple => SubdivisionKind::Simple,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }

        Commands::Subdivide {
            input,
            output,
            levels,
            kind,
            level,
            grids,
        } => {
            if grids {
                cmd_subdivide_grids(&input, &output, levels, kind, level)?;
            } else {
                cmd_subdivide(&input, &output, levels, kind, level)?;
            }
        }
    }

    Ok(())
}

fn cmd_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Edges: {}", mesh.num_edges());
    println!("Faces: {}", mesh.num_faces());

    let quads = mesh.faces.iter().filter(|f| f.quad).count();
    println!("Quads: {}, triangles: {}", quads, mesh.num_faces() - quads);

    if let Some((min, max)) = bounding_box(&mesh) {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
    }

    let session = Session::default();
    let mr = MultiresHierarchy::create(&session.source(&mesh))?;
    let conn = Connectivity::build(mr.current_level(), None);
    let boundary = conn.edge_boundary.iter().filter(|&&b| b).count();
    println!("Boundary edges: {}", boundary);

    Ok(())
}

fn cmd_subdivide(
    input: &PathBuf,
    output: &PathBuf,
    levels: usize,
    kind: Kind,
    level: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = io::load(input)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    let session = Session::default();
    let mut mr = MultiresHierarchy::create(&session.source(&mesh))?;

    let start = Instant::now();
    for _ in 0..levels {
        mr.add_level(&mut mesh, &session, kind.into())?;
    }
    if let Some(lvl) = level {
        mr.set_level(&mut mesh, &session, lvl)?;
    }
    let elapsed = start.elapsed();

    println!(
        "Level {} of {}: {} vertices, {} faces ({:.2?})",
        mr.current(),
        mr.level_count(),
        mesh.num_vertices(),
        mesh.num_faces(),
        elapsed
    );

    io::save(&mesh, output)?;
    println!("Saved: {}", output.display());

    Ok(())
}

fn cmd_subdivide_grids(
    input: &PathBuf,
    output: &PathBuf,
    levels: usize,
    kind: Kind,
    level: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut mesh = io::load(input)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    let evaluator: Rc<dyn SubsurfEvaluator> = Rc::new(CatmullClarkEvaluator::new().with_kind(kind.into()));
    let mut mmd = MultiresModifier::new();

    let start = Instant::now();
    for _ in 0..levels {
        mmd.subdivide(&mut mesh, &evaluator)?;
    }
    if let Some(lvl) = level {
        mmd.set_level(lvl)?;
    }
    let dm = mmd.create_derived(&mesh, &evaluator, false)?;
    let elapsed = start.elapsed();

    println!(
        "Displacement level {} of {}: {} vertices, {} faces ({:.2?})",
        mmd.lvl,
        mmd.totlvl,
        dm.num_vertices(),
        dm.num_faces(),
        elapsed
    );

    io::save(dm.as_mesh(), output)?;
    println!("Saved: {}", output.display());

    Ok(())
}

fn bounding_box(mesh: &Mesh) -> Option<(nalgebra::Vector3<f32>, nalgebra::Vector3<f32>)> {
    let first = mesh.verts.first()?.co;
    Some(mesh.verts.iter().fold((first, first), |(min, max), v| {
        (min.inf(&v.co), max.sup(&v.co))
    }))
}
