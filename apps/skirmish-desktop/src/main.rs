use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use skirmish_assets::samples;
use skirmish_common::{InstanceKey, ItemType, PlayerNumber, Transform};
use skirmish_instancing::{CullingConfig, CullingWorker, FrameStats, InstanceRegistry, RegistryConfig, RotationAxis};
use skirmish_render::{InstanceSubmitter, SubmitStats};
use skirmish_render_wgpu::{FlyCamera, WgpuInstanceRenderer};
use skirmish_terrain::TerrainGrid;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "skirmish-desktop", about = "Skirmish instancing viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of tanks in the field
    #[arg(long, default_value = "400")]
    units: usize,

    /// Number of trees scattered around the field
    #[arg(long, default_value = "300")]
    trees: usize,

    /// Cull on the frame thread instead of the background worker
    #[arg(long)]
    sync_culling: bool,

    /// Registry configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

const DEBRIS_SECONDS: f32 = 3.0;

struct Unit {
    key: InstanceKey,
    turret_speed: f32,
    phase: f32,
}

/// Deterministic pseudo-random value in `[0, 1)`.
fn scatter(i: usize, salt: f32) -> f32 {
    let x = (i as f32 * 12.9898 + salt * 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Application state.
struct AppState {
    registry: InstanceRegistry,
    worker: Option<CullingWorker>,
    culling_config: CullingConfig,
    submitter: InstanceSubmitter,
    camera: FlyCamera,
    units: Vec<Unit>,
    wrecks: Vec<(InstanceKey, f32)>,
    units_requested: usize,
    trees_requested: usize,
    flashing: bool,
    frame_stats: FrameStats,
    submit_stats: SubmitStats,
    show_panel: bool,
    elapsed: f32,
    // Input state
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
}

impl AppState {
    fn new(config: RegistryConfig, units: usize, trees: usize, background: bool) -> Result<Self> {
        let (catalog, loader) = samples::sample_library();
        let culling_config = config.culling.clone();
        let mut registry =
            InstanceRegistry::new(config, catalog, Box::new(loader)).with_terrain(Box::new(TerrainGrid::new(8.0, 64)));
        for item_type in [samples::TANK, samples::TREE, samples::OUTPOST] {
            registry.register_type(item_type);
        }
        while registry.pending_loads() > 0 {
            registry.process_loads();
        }

        let worker = if background {
            Some(CullingWorker::spawn(culling_config.clone()).context("spawning culling worker")?)
        } else {
            None
        };

        let mut state = Self {
            registry,
            worker,
            culling_config,
            submitter: InstanceSubmitter::new(),
            camera: FlyCamera::default(),
            units: Vec::new(),
            wrecks: Vec::new(),
            units_requested: units,
            trees_requested: trees,
            flashing: false,
            frame_stats: FrameStats::default(),
            submit_stats: SubmitStats::default(),
            show_panel: true,
            elapsed: 0.0,
            keys_held: HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
        };
        state.populate();
        Ok(state)
    }

    fn place(&mut self, item_type: ItemType, transform: Transform, player: PlayerNumber) -> Option<InstanceKey> {
        let key = self.registry.allocate_instance_key();
        match self.registry.update_instance_transform(item_type, key, transform, player) {
            Ok(()) => Some(key),
            Err(e) => {
                tracing::warn!("failed to place {item_type}: {e}");
                None
            }
        }
    }

    fn spawn_tank(&mut self, position: Vec3, yaw: f32, player: PlayerNumber) {
        let index = self.units.len();
        if let Some(key) = self.place(samples::TANK, Transform::from_position(position).with_yaw(yaw), player) {
            self.units.push(Unit {
                key,
                turret_speed: 0.4 + scatter(index, 3.0) * 1.2,
                phase: scatter(index, 4.0) * std::f32::consts::TAU,
            });
        }
    }

    fn populate(&mut self) {
        let side = (self.units_requested as f32).sqrt().ceil().max(1.0) as usize;
        let spacing = 6.0;
        let offset = (side as f32 - 1.0) * spacing * 0.5;
        for i in 0..self.units_requested {
            let position = Vec3::new((i % side) as f32 * spacing - offset, 0.0, (i / side) as f32 * spacing - offset);
            let player = PlayerNumber((i * 4 / self.units_requested.max(1)) as u8 + 1);
            self.spawn_tank(position, scatter(i, 1.0) * std::f32::consts::TAU, player);
        }

        let ring = offset + 20.0;
        for i in 0..self.trees_requested {
            let angle = scatter(i, 5.0) * std::f32::consts::TAU;
            let distance = ring + scatter(i, 6.0) * 60.0;
            let position = Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
            self.place(samples::TREE, Transform::from_position(position).with_yaw(angle), PlayerNumber(0));
        }

        for (i, corner) in [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)].into_iter().enumerate() {
            let position = Vec3::new(corner.0 * (offset + 10.0), 0.0, corner.1 * (offset + 10.0));
            self.place(samples::OUTPOST, Transform::from_position(position), PlayerNumber(i as u8 + 1));
        }
        tracing::info!(instances = self.registry.instance_count(), "field populated");
    }

    fn repopulate(&mut self) {
        self.registry.clear_all();
        self.units.clear();
        self.wrecks.clear();
        self.populate();
    }

    fn set_background_culling(&mut self, enabled: bool) {
        match (enabled, self.worker.take()) {
            (true, None) => match CullingWorker::spawn(self.culling_config.clone()) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => tracing::error!("failed to start culling worker: {e}"),
            },
            (false, Some(worker)) => worker.shutdown(),
            (_, worker) => self.worker = worker,
        }
    }

    fn explode_one(&mut self) {
        let Some(unit) = self.units.pop() else {
            return;
        };
        let drift = Vec3::new(scatter(self.wrecks.len(), 7.0) - 0.5, 1.5, scatter(self.wrecks.len(), 8.0) - 0.5) * 4.0;
        match self.registry.set_explode(samples::TANK, unit.key, true, drift) {
            Ok(()) => self.wrecks.push((unit.key, DEBRIS_SECONDS)),
            Err(e) => tracing::warn!("explode failed: {e}"),
        }
    }

    fn toggle_flash(&mut self) {
        self.flashing = !self.flashing;
        for unit in &self.units {
            let player = self.registry.record(unit.key).map(|r| r.player);
            if player == Some(PlayerNumber(1)) {
                if let Err(e) = self.registry.set_flash(samples::TANK, unit.key, self.flashing) {
                    tracing::warn!("flash failed: {e}");
                }
            }
        }
    }

    fn update(&mut self, dt: f32) {
        let speed_mult = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            3.0
        } else {
            1.0
        };
        let dt_scaled = dt * speed_mult;

        let axis = |positive: KeyCode, negative: KeyCode| {
            f32::from(u8::from(self.keys_held.contains(&positive))) - f32::from(u8::from(self.keys_held.contains(&negative)))
        };
        let forward = axis(KeyCode::KeyW, KeyCode::KeyS);
        let right = axis(KeyCode::KeyD, KeyCode::KeyA);
        let up = axis(KeyCode::Space, KeyCode::ControlLeft);
        self.camera.fly(forward, right, up, dt_scaled);

        self.elapsed += dt;
        for unit in &self.units {
            let angle = unit.phase + self.elapsed * unit.turret_speed;
            if let Err(e) = self
                .registry
                .set_bone_rotation(samples::TANK, unit.key, "Turret", RotationAxis::Y, angle)
            {
                tracing::debug!("turret rotation skipped: {e}");
            }
        }

        let mut expired = Vec::new();
        self.wrecks.retain_mut(|(key, left)| {
            *left -= dt;
            if *left <= 0.0 {
                expired.push(*key);
                false
            } else {
                true
            }
        });
        for key in expired {
            if let Err(e) = self.registry.remove_instance(samples::TANK, key) {
                tracing::warn!("failed to clear wreck: {e}");
            }
        }

        self.frame_stats = match &self.worker {
            Some(worker) => self.registry.update_frame_with_worker(worker, &self.camera, dt),
            None => self.registry.update_frame(&self.camera, dt),
        };
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }

        if !pressed {
            return;
        }

        match key {
            KeyCode::KeyN => {
                let ahead = self.camera.position + self.camera.forward() * 15.0;
                self.spawn_tank(Vec3::new(ahead.x, 0.0, ahead.z), self.camera.yaw, PlayerNumber(1));
            }
            KeyCode::KeyX => self.explode_one(),
            KeyCode::KeyF => self.toggle_flash(),
            KeyCode::KeyR => self.repopulate(),
            KeyCode::KeyC => self.set_background_culling(self.worker.is_none()),
            KeyCode::F1 => {
                self.show_panel = !self.show_panel;
            }
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }

        egui::SidePanel::left("stats").default_width(280.0).show(ctx, |ui| {
            ui.heading("Skirmish");
            ui.separator();
            let frame = &self.frame_stats;
            ui.label(format!("Frame: {}", frame.frame));
            ui.label(format!("Instances: {} ({} in view)", frame.instances, frame.visible_instances));
            ui.label(format!(
                "Culled this frame: {}  (+{} / -{})",
                if frame.culled { "yes" } else { "no" },
                frame.became_visible,
                frame.became_hidden
            ));
            ui.label(format!(
                "Requests: {} flushed, {} applied, {} skipped",
                frame.requests_flushed, frame.drain.applied, frame.drain.skipped
            ));
            ui.label(format!(
                "Draws: {} calls, {} instances, {} shadow",
                self.submit_stats.draw_calls, self.submit_stats.instances_drawn, self.submit_stats.shadow_calls
            ));
            ui.label(format!(
                "Camera: ({:.1}, {:.1}, {:.1})",
                self.camera.position.x, self.camera.position.y, self.camera.position.z
            ));
            ui.separator();

            ui.heading("Culling");
            let mut background = self.worker.is_some();
            if ui.checkbox(&mut background, "Background worker (C)").changed() {
                self.set_background_culling(background);
            }
            if let Some(worker) = &self.worker {
                let stats = worker.stats();
                ui.label(format!(
                    "Jobs: {} done, {} rejected, last {:.2} ms",
                    stats.jobs_completed,
                    stats.jobs_rejected,
                    stats.last_elapsed.as_secs_f64() * 1e3
                ));
            }
            ui.separator();

            ui.heading("Models");
            for model in self.registry.models() {
                ui.collapsing(format!("{} [{}]", model.name(), model.item_type()), |ui| {
                    ui.label(format!("instances: {}", model.instance_count()));
                    for part in model.parts() {
                        ui.label(format!(
                            "{:<8} culled {:>5} exploding {:>4}",
                            part.name(),
                            part.culled().len(),
                            part.exploding().len()
                        ));
                    }
                });
            }
            ui.separator();

            ui.heading("Tools");
            if ui.button("Spawn tank (N)").clicked() {
                self.handle_key(KeyCode::KeyN, true);
                self.keys_held.remove(&KeyCode::KeyN);
            }
            if ui.button("Explode tank (X)").clicked() {
                self.explode_one();
            }
            if ui.button("Flash player 1 (F)").clicked() {
                self.toggle_flash();
            }
            if ui.button("Repopulate (R)").clicked() {
                self.repopulate();
            }

            ui.separator();
            ui.small("F1: Toggle panel | RMB: Look | WASD: Move");
        });
    }
}

/// Window, device and everything drawn into the surface.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuInstanceRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn init(event_loop: &ActiveEventLoop, egui_ctx: &EguiContext) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("Skirmish")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("creating window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone()).context("creating surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("skirmish_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("creating device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuInstanceRenderer::new(&device, surface_format, config.width, config.height);
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!("GPU initialized with {} backend", adapter.get_info().backend.to_str());

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.renderer.resize(&self.device, self.config.width, self.config.height);
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            gpu: None,
            egui_ctx: EguiContext::default(),
        }
    }

    fn redraw(&mut self) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;
        self.state.update(dt);

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        gpu.renderer.sync_meshes(&gpu.device, &self.state.registry);
        self.state.submit_stats = self.state.submitter.submit(&self.state.registry, &mut gpu.renderer);
        gpu.renderer.advance(dt);
        gpu.renderer.render(&gpu.device, &gpu.queue, &view, &self.state.camera);

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            self.state.draw_ui(ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        gpu.egui_renderer
            .update_buffers(&gpu.device, &gpu.queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match Gpu::init(event_loop, &self.egui_ctx) {
            Ok(gpu) => {
                self.state.camera.set_aspect(gpu.aspect());
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("failed to initialise GPU: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                    self.state.camera.set_aspect(gpu.aspect());
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state.handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(gpu) = &self.gpu {
                    gpu.window.set_cursor_visible(!self.state.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: winit::event::DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(worker) = self.state.worker.take() {
            worker.shutdown();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("skirmish-desktop starting");

    let config: RegistryConfig = match &cli.config {
        Some(path) => {
            let data = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => RegistryConfig::default(),
    };
    let state = AppState::new(config, cli.units, cli.trees, !cli.sync_culling)?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}
