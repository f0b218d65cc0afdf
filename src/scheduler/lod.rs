use super::backend::ScreenProjection;
use super::groups::ModelGroup;
use super::RenderMode;
use crate::asset::ModelCache;
use crate::scene::RenderInstance;
use crate::settings::ScheduleSettings;
use rayon::prelude::*;

/// Reference sphere radius fed to the screen projector; the doubling below
/// turns the projected radius into a diameter.
const REFERENCE_RADIUS: f32 = 0.5;

/// Picks a detail level for every member of every group. Selection is
/// stateless per frame; there is deliberately no hysteresis.
pub(crate) fn select_lods(
    groups: &mut [ModelGroup],
    instances: &[RenderInstance],
    models: &ModelCache,
    mode: RenderMode,
    settings: &ScheduleSettings,
    projection: &dyn ScreenProjection,
) {
    if mode == RenderMode::RttShadow {
        // Texture shadows always render the coarsest mesh available.
        for group in groups.iter_mut() {
            let Ok(hardware) = models.hardware(group.model) else {
                continue;
            };
            let coarsest = hardware.coarsest_lod() as u32;
            for node in &mut group.nodes {
                node.lod = coarsest;
            }
        }
        return;
    }

    if settings.forced_lod >= 0 {
        slam_lods(settings.forced_lod as usize, groups, models);
        return;
    }

    // Per-group selection is independent; fan out across groups.
    groups.par_iter_mut().for_each(|group| {
        let Some(asset) = models.get(group.model) else {
            return;
        };
        let Ok(hardware) = models.hardware(group.model) else {
            return;
        };
        let max_lod = hardware.max_lod(asset.flags);
        let root_lod = hardware.root_lod.min(max_lod);

        for node in &mut group.nodes {
            let origin = instances[node.instance].drawable.render_origin();
            let screen_size = 2.0 * projection.projected_size(origin, REFERENCE_RADIUS);
            let metric = hardware.metric.metric_for_screen_size(screen_size);
            let lod = hardware.metric.lod_for_metric(metric);
            node.lod = lod.clamp(root_lod, max_lod) as u32;
        }
    });
}

/// Forces every member of every group to one level, clamped to the model's
/// own LOD range.
pub(crate) fn slam_lods(lod: usize, groups: &mut [ModelGroup], models: &ModelCache) {
    for group in groups.iter_mut() {
        let Some(asset) = models.get(group.model) else {
            continue;
        };
        let Ok(hardware) = models.hardware(group.model) else {
            continue;
        };
        let max_lod = hardware.max_lod(asset.flags);
        let root_lod = hardware.root_lod.min(max_lod);
        let clamped = lod.clamp(root_lod, max_lod) as u32;
        for node in &mut group.nodes {
            node.lod = clamped;
        }
    }
}
