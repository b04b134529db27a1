use glam::Vec3;
use skirmish_common::FixedCamera;
use skirmish_instancing::InstanceRegistry;
use std::fmt::Write;

/// Camera/view configuration for headless rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 40.0, 80.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl RenderView {
    pub fn camera(&self) -> FixedCamera {
        FixedCamera::looking_at(self.eye, self.target, self.fov_degrees.to_radians(), self.aspect)
    }
}

/// Renderer-agnostic interface.
///
/// A renderer reads the registry's draw lists and a view, then produces
/// output. It never mutates instances.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    fn render(&self, registry: &InstanceRegistry, view: &RenderView) -> Self::Output;
}

/// Human-readable dump of every model type and its draw lists.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, registry: &InstanceRegistry, view: &RenderView) -> String {
        let mut out = String::new();
        let visible = registry
            .models()
            .map(|model| model.visible_count())
            .sum::<usize>();
        let _ = writeln!(out, "=== Instances (frame={}) ===", registry.frame());
        let _ = writeln!(
            out,
            "Model types: {} ready, {} loading",
            registry.key_lists().ready.len(),
            registry.pending_loads()
        );
        let _ = writeln!(out, "Instances: {} ({} in view)", registry.instance_count(), visible);
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z, view.fov_degrees
        );

        for model in registry.models() {
            let _ = writeln!(
                out,
                "  {} [{}] instances={} parts={}",
                model.name(),
                model.item_type(),
                model.instance_count(),
                model.parts().len()
            );
            for part in model.parts() {
                let _ = writeln!(
                    out,
                    "    {:<8} all={} culled={} exploding={}",
                    part.name(),
                    part.all().len(),
                    part.culled().len(),
                    part.exploding().len()
                );
            }
        }

        out
    }
}
