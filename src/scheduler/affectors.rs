use super::backend::{FlashlightState, RenderBackend, MAX_FLASHLIGHTS_PER_SUBMISSION};
use super::groups::ModelGroup;
use super::records::InstanceRecord;

/// Gathers decal handles and dynamic-light affectors for the whole
/// submission in two batched calls, then fans the results back per record
/// and mirrors the flashlight set onto every group.
pub(crate) fn bind_affectors(
    groups: &mut [ModelGroup],
    records: &mut [InstanceRecord],
    flashlights: &mut Vec<FlashlightState>,
    backend: &mut dyn RenderBackend,
) {
    let mut handles = Vec::new();
    let mut record_indices = Vec::new();
    for group in groups.iter() {
        if group.lod_unavailable {
            continue;
        }
        for index in group.draw_range() {
            handles.push(records[index].model_instance);
            record_indices.push(index);
        }
    }
    // Geometry-less scaffolds can make the gathered count fall short of the
    // nominal instance count; the queries run over what was gathered.
    if handles.is_empty() {
        return;
    }

    let decals = backend.decal_handles(&handles);
    if decals.len() < handles.len() {
        log::debug!(
            "decal query returned {} handles for {} instances",
            decals.len(),
            handles.len()
        );
    }
    for (slot, decal) in record_indices.iter().zip(decals) {
        records[*slot].decal = decal;
    }

    let info = backend.flashlight_info(&handles, MAX_FLASHLIGHTS_PER_SUBMISSION);
    for (slot, usage) in record_indices.iter().zip(info.usage) {
        records[*slot].flashlight_usage = usage;
    }

    flashlights.clear();
    flashlights.extend(
        info.flashlights
            .into_iter()
            .take(MAX_FLASHLIGHTS_PER_SUBMISSION),
    );
    for group in groups.iter_mut() {
        group.flashlight_count = flashlights.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::backend::{
        ArraySubmission, CacheHandle, DecalHandle, FlashlightInfo, LightingQuery,
        LightingResults, MaterialHandle, ModelInstanceHandle, StaticLightingQuery,
        StaticLightingResults,
    };
    use glam::{Mat4, Vec4};

    struct AffectorBackend {
        flashlight_count: usize,
    }

    impl RenderBackend for AffectorBackend {
        fn compute_lighting(&mut self, _: &[LightingQuery]) -> LightingResults {
            LightingResults::default()
        }

        fn compute_static_lighting(&mut self, _: &[StaticLightingQuery]) -> StaticLightingResults {
            StaticLightingResults::default()
        }

        fn decal_handles(&mut self, instances: &[ModelInstanceHandle]) -> Vec<DecalHandle> {
            instances.iter().map(|h| DecalHandle(h.0)).collect()
        }

        fn flashlight_info(
            &mut self,
            instances: &[ModelInstanceHandle],
            max: usize,
        ) -> FlashlightInfo {
            FlashlightInfo {
                usage: vec![0b1; instances.len()],
                flashlights: (0..self.flashlight_count.min(max))
                    .map(|_| FlashlightState {
                        world_to_texture: Mat4::IDENTITY,
                        color: Vec4::ONE,
                    })
                    .collect(),
            }
        }

        fn forced_material_override(&mut self, _: Option<MaterialHandle>) {}

        fn end_depth_prepass(&mut self) {}

        fn draw_model_array(&mut self, _: &ArraySubmission<'_>) {}

        fn draw_shadow_array(&mut self, _: &ArraySubmission<'_>) {}

        fn release_static_lighting(&mut self, _: &[CacheHandle]) {}
    }

    fn group_with_records(records: &mut Vec<InstanceRecord>, count: usize) -> ModelGroup {
        let start = records.len();
        for i in 0..count {
            let mut record = InstanceRecord {
                instance_index: start + i,
                lod: 0,
                skin: 0,
                body: 0,
                model_instance: ModelInstanceHandle((start + i) as u32),
                setup_bones_only: false,
                bone_merge: false,
                stencil: None,
                bone_to_world: crate::scheduler::internal::arena::ArenaRange::EMPTY,
                pose_to_world: crate::scheduler::internal::arena::ArenaRange::EMPTY,
                weights: crate::scheduler::internal::arena::ArenaRange::EMPTY,
                delayed_weights: crate::scheduler::internal::arena::ArenaRange::EMPTY,
                lighting_state: None,
                decal_lighting_state: None,
                env_cubemap: None,
                color_mesh: None,
                decal: DecalHandle::INVALID,
                flashlight_usage: 0,
                diffuse_modulation: Vec4::ONE,
            };
            record.instance_index = start + i;
            records.push(record);
        }
        ModelGroup {
            model: crate::asset::Handle::new(0),
            lighting_model: crate::scene::LightingModel::Standard,
            wants_stencil: false,
            lod_unavailable: false,
            parent_depth: 0,
            nodes: Vec::new(),
            records: start..records.len(),
            setup_only: 0,
            flashlight_count: 0,
        }
    }

    #[test]
    fn flashlight_list_is_bounded_and_mirrored_onto_groups() {
        let mut records = Vec::new();
        let mut groups = vec![
            group_with_records(&mut records, 2),
            group_with_records(&mut records, 1),
        ];

        let mut backend = AffectorBackend {
            flashlight_count: 16,
        };
        let mut flashlights = Vec::new();
        bind_affectors(&mut groups, &mut records, &mut flashlights, &mut backend);

        assert_eq!(flashlights.len(), MAX_FLASHLIGHTS_PER_SUBMISSION);
        assert!(groups
            .iter()
            .all(|g| g.flashlight_count == MAX_FLASHLIGHTS_PER_SUBMISSION));
        assert!(records.iter().all(|r| r.flashlight_usage == 0b1));
        assert_eq!(records[2].decal, DecalHandle(2));
    }
}
