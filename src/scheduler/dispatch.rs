use super::backend::{
    ArraySubmission, DrawFlags, GroupDraw, InstanceDrawData, RenderBackend, INVALID_INDEX,
};
use super::frame::FallbackResources;
use super::groups::ModelGroup;
use super::internal::arena::FrameArena;
use super::records::InstanceRecord;
use super::RenderMode;
use crate::asset::ModelCache;
use crate::scene::RenderInstance;
use crate::scheduler::backend::{FlashlightState, LightingState};
use crate::scene::StencilState;
use crate::settings::ScheduleSettings;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DispatchStats {
    pub submissions: usize,
    pub instances: usize,
}

pub(crate) fn pack_record(record: &InstanceRecord) -> InstanceDrawData {
    InstanceDrawData {
        diffuse_modulation: record.diffuse_modulation.to_array(),
        pose_to_world_first: record.pose_to_world.start() as u32,
        bone_count: record.pose_to_world.len() as u32,
        skin: record.skin,
        body: record.body,
        lod: record.lod,
        initial_list_index: record.instance_index as u32,
        lighting_state: record.lighting_state.unwrap_or(INVALID_INDEX),
        decal_lighting_state: record.decal_lighting_state.unwrap_or(INVALID_INDEX),
        env_cubemap: record.env_cubemap.map(|t| t.0).unwrap_or(INVALID_INDEX),
        color_mesh: record.color_mesh.map(|c| c.0).unwrap_or(INVALID_INDEX),
        decal: record.decal.0,
        flashlight_usage: record.flashlight_usage,
        stencil: record.stencil.unwrap_or(INVALID_INDEX),
        flags: if record.bone_merge {
            super::backend::INSTANCE_BONE_MERGED
        } else {
            0
        },
    }
}

/// Packs the ordered groups into one contiguous instance array plus
/// per-group spans. Unavailable and draw-less groups contribute nothing.
pub(crate) fn pack_groups(
    groups: &[ModelGroup],
    records: &[InstanceRecord],
) -> (Vec<GroupDraw>, Vec<InstanceDrawData>) {
    let mut group_draws = Vec::with_capacity(groups.len());
    let mut instance_data = Vec::new();
    for group in groups {
        if group.draw_count() == 0 {
            continue;
        }
        let first = instance_data.len() as u32;
        for record in &records[group.draw_range()] {
            instance_data.push(pack_record(record));
        }
        group_draws.push(GroupDraw {
            model: group.model,
            first_instance: first,
            instance_count: group.draw_count() as u32,
            flashlight_count: group.flashlight_count as u32,
            wants_stencil: group.wants_stencil,
        });
    }
    (group_draws, instance_data)
}

/// Issues the frame's batched submissions: one call in the common case, a
/// split pair around a depth-prepass barrier when deferred stencil is in
/// play, and a material-overridden call for texture shadows.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dispatch(
    groups: &[ModelGroup],
    records: &[InstanceRecord],
    instances: &[RenderInstance],
    models: &ModelCache,
    arena: &FrameArena,
    lighting_states: &[LightingState],
    stencil_states: &[StencilState],
    flashlights: &[FlashlightState],
    mode: RenderMode,
    settings: &ScheduleSettings,
    resources: &FallbackResources,
    backend: &mut dyn RenderBackend,
) -> DispatchStats {
    let (group_draws, instance_data) = pack_groups(groups, records);
    let mut stats = DispatchStats {
        submissions: 0,
        instances: instance_data.len(),
    };
    if group_draws.is_empty() {
        return stats;
    }

    let mut submission = ArraySubmission {
        flags: DrawFlags::OPAQUE_ONLY,
        models,
        groups: &group_draws,
        instances: &instance_data,
        instance_stride: std::mem::size_of::<InstanceDrawData>(),
        pose_matrices: &arena.matrices,
        lighting_states,
        stencil_states,
        flashlights,
    };

    match mode {
        RenderMode::Standard => {
            if settings.colorize_fast_path {
                backend.forced_material_override(Some(resources.debug_material));
            }

            let non_stencil = group_draws
                .iter()
                .take_while(|g| !g.wants_stencil)
                .count();
            if settings.deferred_stencil && non_stencil != group_draws.len() {
                // Stencil writes are forbidden during the depth prepass:
                // submit the plain groups, end the prepass, then the tail.
                if non_stencil > 0 {
                    submission.groups = &group_draws[..non_stencil];
                    backend.draw_model_array(&submission);
                    stats.submissions += 1;
                }
                backend.end_depth_prepass();
                submission.groups = &group_draws[non_stencil..];
                backend.draw_model_array(&submission);
                stats.submissions += 1;
            } else {
                backend.draw_model_array(&submission);
                stats.submissions += 1;
            }

            if settings.colorize_fast_path {
                backend.forced_material_override(None);
            }
        }
        RenderMode::ShadowDepth {
            include_translucent,
        } => {
            let mut flags = DrawFlags::SHADOW_DEPTH;
            flags |= if include_translucent {
                DrawFlags::INCLUDE_TRANSLUCENT
            } else {
                DrawFlags::OPAQUE_ONLY
            };
            submission.flags = flags;
            backend.draw_shadow_array(&submission);
            stats.submissions += 1;
        }
        RenderMode::RttShadow => {
            // All members of a texture-shadow batch share one material; the
            // override applies per call, not per group.
            let material = groups
                .iter()
                .find(|g| g.draw_count() > 0)
                .and_then(|g| {
                    let first = g.draw_range().start;
                    instances[records[first].instance_index]
                        .drawable
                        .shadow_material()
                })
                .unwrap_or(resources.shadow_build_material);
            backend.forced_material_override(Some(material));
            backend.draw_model_array(&submission);
            stats.submissions += 1;
            backend.forced_material_override(None);
        }
    }

    stats
}
