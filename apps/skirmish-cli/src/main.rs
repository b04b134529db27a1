use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glam::Vec3;
use skirmish_assets::{ManifestLoader, ModelCatalog, ModelLoader, samples};
use skirmish_common::{Camera, FixedCamera, Frustum, InstanceKey, ItemType, PlayerNumber, Transform};
use skirmish_instancing::{CullingWorker, InstanceRegistry, RegistryConfig, RotationAxis};
use skirmish_render::{DebugTextRenderer, InstanceSubmitter, RecordingBackend, RenderView, Renderer};
use skirmish_terrain::TerrainGrid;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skirmish-cli", about = "CLI tool for the skirmish instancing engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Run headless frames over a field of instances
    Simulate {
        /// Number of instances to spawn
        #[arg(short, long, default_value = "200")]
        instances: usize,
        /// Number of frames to run
        #[arg(short, long, default_value = "60")]
        frames: u64,
        /// Load manifests from this directory instead of the built-in samples
        #[arg(long)]
        manifests: Option<PathBuf>,
        /// Loose-file root tried once the packed manifests keep failing
        #[arg(long, requires = "manifests")]
        fallback: Option<PathBuf>,
        /// Registry configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the draw-list dump after the last frame
        #[arg(long)]
        dump: bool,
    },
    /// Run the background culling worker over a generated field
    Cull {
        /// Number of instances in the field
        #[arg(short, long, default_value = "20000")]
        instances: usize,
        /// Number of camera positions to scan
        #[arg(short, long, default_value = "8")]
        jobs: usize,
        /// Registry configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or export model manifests
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Parse and validate a `.model.json` file
    Validate { file: PathBuf },
    /// Write the built-in sample manifests and a catalog under a directory
    Export { dir: PathBuf },
}

/// Orbits the origin; each step is a new camera generation.
struct OrbitCamera {
    inner: FixedCamera,
    generation: u64,
}

impl OrbitCamera {
    fn at_angle(angle: f32, radius: f32, generation: u64) -> Self {
        let eye = Vec3::new(angle.cos() * radius, radius * 0.5, angle.sin() * radius);
        Self {
            inner: FixedCamera::looking_at(eye, Vec3::ZERO, 60f32.to_radians(), 16.0 / 9.0),
            generation,
        }
    }
}

impl Camera for OrbitCamera {
    fn frustum(&self) -> Frustum {
        self.inner.frustum()
    }

    fn generation(&self) -> u64 {
        self.generation
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RegistryConfig> {
    let Some(path) = path else {
        return Ok(RegistryConfig::default());
    };
    let data = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn build_registry(config: RegistryConfig, manifests: Option<&Path>, fallback: Option<&Path>) -> anyhow::Result<InstanceRegistry> {
    let (catalog, loader): (ModelCatalog, Box<dyn ModelLoader>) = match manifests {
        Some(dir) => {
            let catalog_file = dir.join("catalog.json");
            let catalog = ModelCatalog::load(&catalog_file)
                .with_context(|| format!("loading catalog {}", catalog_file.display()))?;
            let loader = match fallback {
                Some(fallback) => ManifestLoader::new(dir).with_fallback(fallback),
                None => ManifestLoader::new(dir),
            };
            (catalog, Box::new(loader) as Box<dyn ModelLoader>)
        }
        None => {
            let (catalog, loader) = samples::sample_library();
            (catalog, Box::new(loader) as Box<dyn ModelLoader>)
        }
    };
    let types: Vec<ItemType> = catalog.item_types().collect();
    let mut registry = InstanceRegistry::new(config, catalog, loader).with_terrain(Box::new(TerrainGrid::new(8.0, 64)));
    for item_type in &types {
        registry.register_type(*item_type);
    }
    while registry.pending_loads() > 0 {
        registry.process_loads();
    }
    let ready = registry.key_lists().ready.len();
    if ready == 0 {
        bail!("no model type could be loaded");
    }
    tracing::info!(ready, requested = types.len(), "model types loaded");
    Ok(registry)
}

/// Lays `count` instances out on a square grid, cycling through the ready types.
fn populate(registry: &mut InstanceRegistry, count: usize, spacing: f32) -> anyhow::Result<Vec<(ItemType, InstanceKey)>> {
    let types = registry.key_lists().ready.clone();
    let side = (count as f32).sqrt().ceil().max(1.0) as usize;
    let offset = (side as f32 - 1.0) * spacing * 0.5;
    let mut spawned = Vec::with_capacity(count);
    for i in 0..count {
        let item_type = types[i % types.len()];
        let position = Vec3::new((i % side) as f32 * spacing - offset, 0.0, (i / side) as f32 * spacing - offset);
        let key = registry.allocate_instance_key();
        let player = PlayerNumber((i % 4) as u8 + 1);
        registry.update_instance_transform(item_type, key, Transform::from_position(position).with_yaw(i as f32), player)?;
        spawned.push((item_type, key));
    }
    Ok(spawned)
}

struct SimulateArgs<'a> {
    instances: usize,
    frames: u64,
    manifests: Option<&'a Path>,
    fallback: Option<&'a Path>,
    config: Option<&'a Path>,
    dump: bool,
}

fn simulate(args: SimulateArgs<'_>) -> anyhow::Result<()> {
    let SimulateArgs {
        instances,
        frames,
        manifests,
        fallback,
        config,
        dump,
    } = args;
    let mut registry = build_registry(load_config(config)?, manifests, fallback)?;
    let spawned = populate(&mut registry, instances, 4.0)?;
    println!("Simulating {frames} frames over {} instances", spawned.len());

    let mut submitter = InstanceSubmitter::new();
    let mut backend = RecordingBackend::new();
    let dt = 1.0 / 60.0;
    let started = Instant::now();

    for frame in 0..frames {
        let angle = frame as f32 * 0.02;
        for (item_type, key) in &spawned {
            if *item_type == samples::TANK {
                registry.set_bone_rotation(*item_type, *key, "Turret", RotationAxis::Y, angle * 3.0)?;
            }
        }
        if frame == frames / 2 {
            if let Some((item_type, key)) = spawned.iter().find(|(t, _)| *t == samples::TANK) {
                registry.set_explode(*item_type, *key, true, Vec3::new(0.0, 6.0, 2.0))?;
            }
        }

        let camera = OrbitCamera::at_angle(angle, 60.0, frame + 1);
        let stats = registry.update_frame(&camera, dt);
        let submitted = submitter.submit(&registry, &mut backend);
        tracing::debug!(
            frame,
            visible = stats.visible_instances,
            applied = stats.drain.applied,
            calls = submitted.draw_calls,
            "frame"
        );
        if frame % 10 == 0 || frame + 1 == frames {
            println!(
                "frame {:>4}: visible {:>5}/{:<5} +{:<4} -{:<4} draws {:>3} ({} instances, {} shadow)",
                stats.frame,
                stats.visible_instances,
                stats.instances,
                stats.became_visible,
                stats.became_hidden,
                submitted.draw_calls,
                submitted.instances_drawn,
                submitted.shadow_calls,
            );
        }
    }

    let elapsed = started.elapsed();
    println!(
        "Done: {frames} frames in {:.1} ms ({:.3} ms/frame), instance stream grew {} times",
        elapsed.as_secs_f64() * 1e3,
        elapsed.as_secs_f64() * 1e3 / frames.max(1) as f64,
        submitter.stream().grow_count(),
    );
    print!("{}", backend.summary());
    if dump {
        print!("{}", DebugTextRenderer::new().render(&registry, &RenderView::default()));
    }
    Ok(())
}

fn cull(instances: usize, jobs: usize, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let worker = CullingWorker::spawn(config.culling.clone())?;
    let mut registry = build_registry(config, None, None)?;
    populate(&mut registry, instances, 3.0)?;
    println!("Culling {} instances from {jobs} camera positions", registry.instance_count());

    for i in 0..jobs {
        let angle = i as f32 * std::f32::consts::TAU / jobs.max(1) as f32;
        let camera = OrbitCamera::at_angle(angle, 120.0, i as u64 + 1);
        if !worker.submit(registry.cull_job(&camera)) {
            println!("job {i}: rejected, worker busy");
            continue;
        }
        let Some(outcome) = worker.recv_timeout(Duration::from_secs(10)) else {
            bail!("culling worker did not answer job {i}");
        };
        // Applying keeps `was_visible` current for the next snapshot.
        registry.apply_visibility(&outcome);
        println!(
            "job {i}: tested {:>6} visible {:>6} +{:<6} -{:<6} throttled {} in {:.2} ms",
            outcome.stats.tested,
            outcome.stats.visible,
            outcome.stats.became_visible,
            outcome.stats.became_hidden,
            outcome.stats.throttled,
            outcome.stats.elapsed.as_secs_f64() * 1e3,
        );
    }

    let stats = worker.stats();
    println!(
        "Worker: {} completed, {} cancelled, {} rejected, {} instances tested",
        stats.jobs_completed, stats.jobs_cancelled, stats.jobs_rejected, stats.instances_tested
    );
    worker.shutdown();
    Ok(())
}

fn manifest(action: ManifestAction) -> anyhow::Result<()> {
    match action {
        ManifestAction::Validate { file } => {
            let asset = ManifestLoader::read_manifest(&file).with_context(|| format!("validating {}", file.display()))?;
            println!(
                "{}: {} parts, {} bones, radius {:.2}",
                asset.name,
                asset.parts.len(),
                asset.bones.len(),
                asset.bounds.radius
            );
            for part in &asset.parts {
                let (vertices, indices) = part
                    .mesh
                    .as_ref()
                    .map_or((0, 0), |mesh| (mesh.vertex_count(), mesh.index_count()));
                println!("  {:<10} bone {:<2} {vertices} vertices, {indices} indices", part.name, part.bone);
            }
        }
        ManifestAction::Export { dir } => {
            let (catalog, _) = samples::sample_library();
            std::fs::create_dir_all(&dir)?;
            for (item_type, asset) in [(samples::TANK, samples::tank()), (samples::TREE, samples::tree()), (samples::OUTPOST, samples::outpost())] {
                let Some(path) = catalog.path(item_type) else {
                    continue;
                };
                let file = ManifestLoader::write_manifest(&dir, path, &asset)?;
                println!("wrote {}", file.display());
            }
            catalog.save(dir.join("catalog.json"))?;
            println!("wrote {}", dir.join("catalog.json").display());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("skirmish-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", skirmish_common::crate_info());
            println!("assets: {}", skirmish_assets::crate_info());
            println!("terrain: {}", skirmish_terrain::crate_info());
            println!("instancing: {}", skirmish_instancing::crate_info());
            println!("render: {}", skirmish_render::crate_info());
            let defaults = serde_json::to_string_pretty(&RegistryConfig::default())?;
            println!("default config:\n{defaults}");
        }
        Commands::Simulate {
            instances,
            frames,
            manifests,
            fallback,
            config,
            dump,
        } => simulate(SimulateArgs {
            instances,
            frames,
            manifests: manifests.as_deref(),
            fallback: fallback.as_deref(),
            config: config.as_deref(),
            dump,
        })?,
        Commands::Cull { instances, jobs, config } => cull(instances, jobs, config.as_deref())?,
        Commands::Manifest { action } => manifest(action)?,
    }

    Ok(())
}
