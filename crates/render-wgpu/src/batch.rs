use skirmish_common::ItemType;
use skirmish_render::{DrawBackend, InstancedDraw, InstanceVertex, Technique};

/// A range of the frame's instance buffer drawn with one part mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub item_type: ItemType,
    pub part: usize,
    pub technique: Technique,
    pub pass: u32,
    pub first_instance: u32,
    pub count: u32,
}

impl Batch {
    pub fn instances(&self) -> std::ops::Range<u32> {
        self.first_instance..self.first_instance + self.count
    }
}

/// CPU side of a frame: every instance slice the submitter handed over,
/// packed back to back, plus the batches that index into it.
#[derive(Debug, Default)]
pub struct FrameBatches {
    staging: Vec<InstanceVertex>,
    batches: Vec<Batch>,
}

impl FrameBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.staging.clear();
        self.batches.clear();
    }

    pub fn staging(&self) -> &[InstanceVertex] {
        &self.staging
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn for_technique(&self, technique: Technique) -> impl Iterator<Item = &Batch> + '_ {
        self.batches.iter().filter(move |batch| batch.technique == technique)
    }

    /// Records one draw. A later pass of the same part reuses the range the
    /// first pass uploaded.
    pub fn push(&mut self, draw: &InstancedDraw<'_>) {
        if draw.instances.is_empty() {
            return;
        }
        let count = draw.instances.len() as u32;
        let reused = self.batches.last().filter(|last| {
            draw.pass > 0
                && last.item_type == draw.item_type
                && last.part == draw.part
                && last.technique == draw.technique
                && last.count == count
        });
        let first_instance = match reused {
            Some(last) => last.first_instance,
            None => {
                let first = self.staging.len() as u32;
                self.staging.extend_from_slice(draw.instances);
                first
            }
        };
        self.batches.push(Batch {
            item_type: draw.item_type,
            part: draw.part,
            technique: draw.technique,
            pass: draw.pass,
            first_instance,
            count,
        });
    }
}

impl DrawBackend for FrameBatches {
    fn begin_frame(&mut self) {
        self.clear();
    }

    fn draw_instanced(&mut self, draw: &InstancedDraw<'_>) {
        self.push(draw);
    }
}
