use glam::Vec3;
use skirmish_common::ItemType;
use std::fmt::Write;

use crate::technique::Technique;
use crate::vertex::InstanceVertex;

/// One instanced draw of one part.
#[derive(Debug, Clone, Copy)]
pub struct InstancedDraw<'a> {
    pub item_type: ItemType,
    pub part: usize,
    pub part_name: &'a str,
    pub technique: Technique,
    /// Zero-based pass within the technique.
    pub pass: u32,
    pub instances: &'a [InstanceVertex],
}

/// Where instanced draws end up. Instance data is only valid for the
/// duration of the call; backends copy what they keep.
pub trait DrawBackend {
    fn begin_frame(&mut self) {}

    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>);

    fn end_frame(&mut self) {}
}

/// What a [`RecordingBackend`] saw for one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub item_type: ItemType,
    pub part: usize,
    pub part_name: String,
    pub technique: Technique,
    pub pass: u32,
    pub instance_count: usize,
    pub first_position: Option<Vec3>,
}

/// Records draw calls instead of issuing them. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<DrawCall>,
    frames: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls of the last frame.
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn calls_for(&self, technique: Technique) -> impl Iterator<Item = &DrawCall> + '_ {
        self.calls.iter().filter(move |call| call.technique == technique)
    }

    pub fn instance_total(&self) -> usize {
        self.calls.iter().map(|call| call.instance_count).sum()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "frame {}: {} draw calls, {} instances",
            self.frames,
            self.calls.len(),
            self.instance_total()
        );
        for call in &self.calls {
            let _ = writeln!(
                out,
                "  {:<9} {} {:<8} pass {} x{}",
                call.technique.to_string(),
                call.item_type,
                call.part_name,
                call.pass,
                call.instance_count
            );
        }
        out
    }
}

impl DrawBackend for RecordingBackend {
    fn begin_frame(&mut self) {
        self.calls.clear();
    }

    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>) {
        self.calls.push(DrawCall {
            item_type: draw.item_type,
            part: draw.part,
            part_name: draw.part_name.to_string(),
            technique: draw.technique,
            pass: draw.pass,
            instance_count: draw.instances.len(),
            first_position: draw
                .instances
                .first()
                .map(|instance| instance.model().transform_point3(Vec3::ZERO)),
        });
    }

    fn end_frame(&mut self) {
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    #[test]
    fn records_and_summarises() {
        let instances = [InstanceVertex::new(Mat4::from_translation(Vec3::X), [0.0; 4])];
        let mut backend = RecordingBackend::new();
        backend.begin_frame();
        backend.draw_instanced(&InstancedDraw {
            item_type: ItemType(0),
            part: 0,
            part_name: "Hull",
            technique: Technique::HardwareInstancing,
            pass: 0,
            instances: &instances,
        });
        backend.end_frame();

        assert_eq!(backend.frames(), 1);
        assert_eq!(backend.calls()[0].first_position, Some(Vec3::X));
        assert_eq!(backend.instance_total(), 1);
        let summary = backend.summary();
        assert!(summary.contains("1 draw calls"));
        assert!(summary.contains("Hull"));

        backend.begin_frame();
        assert!(backend.calls().is_empty());
    }
}
