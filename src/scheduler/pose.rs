use super::groups::ModelGroup;
use super::internal::arena::FrameArena;
use super::records::InstanceRecord;
use crate::asset::ModelCache;
use crate::error::ScheduleError;
use crate::scene::{BoneMask, RenderInstance};
use glam::Affine3A;

/// Counters surfaced into the frame summary; the amortization contract
/// (one basis conversion per group, not per instance) is checked off these.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PoseStats {
    pub basis_conversions: usize,
    pub bone_setups: usize,
    pub identity_fallbacks: usize,
}

/// Resolves world bone transforms group by group, in dependency order.
///
/// Groups must arrive parents-first: an attached child reads its parent's
/// already written world transforms during its own bone setup, which is why
/// the ordering pass is a correctness requirement and not a heuristic.
pub(crate) fn resolve_poses(
    groups: &[ModelGroup],
    instances: &[RenderInstance],
    models: &ModelCache,
    records: &mut [InstanceRecord],
    arena: &mut FrameArena,
    time: f32,
) -> PoseStats {
    let mut stats = PoseStats::default();
    let mut basis: Vec<Affine3A> = Vec::new();

    for group in groups {
        if group.lod_unavailable {
            continue;
        }
        let Some(asset) = models.get(group.model) else {
            continue;
        };
        let skeleton = &asset.skeleton;
        let bone_count = skeleton.bone_count;
        if bone_count == 0 {
            continue;
        }

        let include_attachments = skeleton.illum_attachment.is_some();

        // Bone setup covers the whole group, drawable or not: setup-only
        // records are exactly the dependencies children hang off.
        for record in &mut records[group.record_range()] {
            let range = arena.alloc_matrices(bone_count);
            record.bone_to_world = range;
            let mask = BoneMask {
                lod: record.lod,
                include_attachments,
            };
            let ok = instances[record.instance_index].drawable.setup_bones(
                mask,
                time,
                arena.matrices_mut(range),
            );
            stats.bone_setups += 1;
            if !ok {
                // alloc_matrices hands out identity already; just reclear in
                // case the callee wrote partial garbage before failing.
                arena.matrices_mut(range).fill(Affine3A::IDENTITY);
                stats.identity_fallbacks += 1;
                log::debug!(
                    "{}",
                    ScheduleError::BoneSetup {
                        instance: record.instance_index
                    }
                );
            }
        }

        if group.draw_count() == 0 {
            continue;
        }

        // One bind-pose conversion per group; every instance below reuses it.
        skeleton.pose_to_bone_basis(&mut basis);
        stats.basis_conversions += 1;

        for record in &mut records[group.draw_range()] {
            let dst = arena.alloc_matrices(bone_count);
            arena.concat_matrices(record.bone_to_world, &basis, dst);
            record.pose_to_world = dst;
        }
    }

    stats
}

/// Fills morph weight buffers for groups whose model declares them. Skipped
/// entirely in texture-shadow rendering.
pub(crate) fn resolve_weights(
    groups: &[ModelGroup],
    instances: &[RenderInstance],
    models: &ModelCache,
    records: &mut [InstanceRecord],
    arena: &mut FrameArena,
    smooth: bool,
) {
    for group in groups {
        if group.lod_unavailable {
            continue;
        }
        let Some(asset) = models.get(group.model) else {
            continue;
        };
        let weight_count = asset.skeleton.morph_weight_count;
        if weight_count == 0 {
            continue;
        }

        for record in &mut records[group.draw_range()] {
            record.weights = arena.alloc_scalars(weight_count);
            if smooth {
                record.delayed_weights = arena.alloc_scalars(weight_count);
            }

            let bones = {
                // Weights read bones, so the matrix table is borrowed
                // immutably while the scalar table is written.
                let matrices = &arena.matrices;
                &matrices[record.bone_to_world.range()]
            };
            let (head, tail) = arena.scalars.split_at_mut(record.weights.range().end);
            let weights = &mut head[record.weights.range()];
            let delayed = if smooth {
                Some(&mut tail[..record.delayed_weights.len()])
            } else {
                None
            };
            instances[record.instance_index]
                .drawable
                .setup_weights(bones, weights, delayed);
        }
    }
}
