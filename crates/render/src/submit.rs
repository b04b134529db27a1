use skirmish_instancing::{InstanceRegistry, InstancedModel, PartType};

use crate::backend::{DrawBackend, InstancedDraw};
use crate::stream::InstanceStream;
use crate::technique::Technique;
use crate::vertex::InstanceVertex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub draw_calls: usize,
    pub instances_drawn: usize,
    pub empty_parts: usize,
    pub shadow_calls: usize,
}

/// Serialises each part's draw list into an instance stream and issues one
/// instanced draw per part per technique pass.
///
/// Normal parts draw their culled list, explosion pieces their exploding
/// list. Parts with nothing to draw issue no call at all.
#[derive(Debug)]
pub struct InstanceSubmitter {
    stream: InstanceStream,
    shadows: bool,
}

impl Default for InstanceSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceSubmitter {
    pub fn new() -> Self {
        Self {
            stream: InstanceStream::new(),
            shadows: true,
        }
    }

    pub fn with_shadows(mut self, shadows: bool) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn stream(&self) -> &InstanceStream {
        &self.stream
    }

    /// Shadow casters first, then opaque models, then alpha-blended ones.
    pub fn submit(&mut self, registry: &InstanceRegistry, backend: &mut dyn DrawBackend) -> SubmitStats {
        let _span = tracing::info_span!("submit").entered();
        let mut stats = SubmitStats::default();
        backend.begin_frame();

        if self.shadows {
            for model in registry.shadow_casters().iter().filter_map(|t| registry.model(*t)) {
                let calls = self.submit_model(model, Technique::ShadowMap, backend, &mut stats);
                stats.shadow_calls += calls;
            }
        }
        for model in registry.models().filter(|m| !m.flags().alpha_blended) {
            self.submit_model(model, Technique::HardwareInstancing, backend, &mut stats);
        }
        for model in registry.alpha_blended().iter().filter_map(|t| registry.model(*t)) {
            self.submit_model(model, Technique::AlphaBlended, backend, &mut stats);
        }

        backend.end_frame();
        tracing::trace!(calls = stats.draw_calls, instances = stats.instances_drawn, "frame submitted");
        stats
    }

    /// Returns the number of draw calls issued.
    pub fn submit_model(
        &mut self,
        model: &InstancedModel,
        technique: Technique,
        backend: &mut dyn DrawBackend,
        stats: &mut SubmitStats,
    ) -> usize {
        let mut calls = 0;
        for (index, part) in model.parts().iter().enumerate() {
            let list = part.draw_list();
            if list.is_empty() {
                stats.empty_parts += 1;
                continue;
            }
            let explosion = part.part_type() == PartType::Explosion;
            self.stream
                .fill(list.values().map(|record| InstanceVertex::from_record(record, explosion)));

            for pass in 0..technique.pass_count() {
                backend.draw_instanced(&InstancedDraw {
                    item_type: model.item_type(),
                    part: index,
                    part_name: part.name(),
                    technique,
                    pass,
                    instances: self.stream.as_slice(),
                });
                calls += 1;
                stats.instances_drawn += self.stream.len();
            }
        }
        stats.draw_calls += calls;
        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use glam::Vec3;
    use skirmish_assets::samples;
    use skirmish_common::{FixedCamera, PlayerNumber, Transform};
    use skirmish_instancing::RegistryConfig;

    fn registry_with(types: &[skirmish_common::ItemType]) -> InstanceRegistry {
        let (catalog, loader) = samples::sample_library();
        let mut registry = InstanceRegistry::new(RegistryConfig::default(), catalog, Box::new(loader));
        for item_type in types {
            registry.register_type(*item_type);
        }
        registry.process_loads();
        registry
    }

    fn camera() -> FixedCamera {
        FixedCamera::looking_at(Vec3::new(0.0, 30.0, 60.0), Vec3::ZERO, 1.0, 1.5)
    }

    fn spawn(registry: &mut InstanceRegistry, item_type: skirmish_common::ItemType, x: f32) {
        let key = registry.allocate_instance_key();
        registry
            .update_instance_transform(item_type, key, Transform::from_position(Vec3::new(x, 0.0, 0.0)), PlayerNumber(1))
            .unwrap();
    }

    #[test]
    fn empty_lists_issue_no_calls() {
        let registry = registry_with(&[samples::TANK]);
        let mut backend = RecordingBackend::new();
        let stats = InstanceSubmitter::new().submit(&registry, &mut backend);
        assert_eq!(stats.draw_calls, 0);
        assert!(backend.calls().is_empty());
        assert_eq!(backend.frames(), 1);
    }

    #[test]
    fn one_call_per_visible_part() {
        let mut registry = registry_with(&[samples::TANK]);
        spawn(&mut registry, samples::TANK, 0.0);
        spawn(&mut registry, samples::TANK, 2.0);
        registry.update_frame(&camera(), 0.016);

        let mut backend = RecordingBackend::new();
        let stats = InstanceSubmitter::new().with_shadows(false).submit(&registry, &mut backend);

        // Hull, Turret, Barrel; the explosion pieces have nothing to draw.
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.empty_parts, 2);
        assert!(backend.calls().iter().all(|call| call.instance_count == 2));
    }

    #[test]
    fn alpha_models_draw_twice_and_shadows_first() {
        let mut registry = registry_with(&[samples::TREE]);
        spawn(&mut registry, samples::TREE, 0.0);
        registry.update_frame(&camera(), 0.016);

        let mut backend = RecordingBackend::new();
        let stats = InstanceSubmitter::new().submit(&registry, &mut backend);

        assert_eq!(stats.shadow_calls, 2);
        assert_eq!(backend.calls_for(Technique::AlphaBlended).count(), 4);
        assert_eq!(backend.calls_for(Technique::HardwareInstancing).count(), 0);
        assert_eq!(backend.calls()[0].technique, Technique::ShadowMap);
    }

    #[test]
    fn exploding_instances_draw_debris_only() {
        let mut registry = registry_with(&[samples::TANK]);
        let key = registry.allocate_instance_key();
        registry
            .update_instance_transform(samples::TANK, key, Transform::default(), PlayerNumber(1))
            .unwrap();
        registry.set_explode(samples::TANK, key, true, Vec3::Y).unwrap();
        registry.update_frame(&camera(), 0.016);

        let mut backend = RecordingBackend::new();
        InstanceSubmitter::new().with_shadows(false).submit(&registry, &mut backend);
        let names: Vec<_> = backend.calls().iter().map(|call| call.part_name.as_str()).collect();
        assert_eq!(names, vec!["Piece1", "Piece2"]);
    }
}
