use super::backend::{
    CacheHandle, FlashlightState, InstanceDrawData, LightingState, MaterialHandle, RenderBackend,
    ScreenProjection, TextureHandle,
};
use super::groups::{build_groups, ModelGroup};
use super::internal::arena::FrameArena;
use super::records::InstanceRecord;
use super::{affectors, dispatch, lighting, lod, modulation, ordering, pose, records};
use super::RenderMode;
use crate::asset::{Handle, ModelAsset, ModelCache};
use crate::scene::{RenderInstance, StencilState};
use crate::settings::ScheduleSettings;
use glam::Affine3A;

/// Handles the scheduler falls back to when queries come back empty.
#[derive(Debug, Clone, Copy)]
pub struct FallbackResources {
    pub default_cubemap: TextureHandle,
    pub debug_material: MaterialHandle,
    pub shadow_build_material: MaterialHandle,
}

/// What one scheduling pass did, for logging and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameSummary {
    pub group_count: usize,
    pub stencil_instance_count: usize,
    pub drawn_instance_count: usize,
    pub bone_setup_count: usize,
    pub basis_conversions: usize,
    pub submissions: usize,
}

/// Per-frame storage, reset in bulk at the start of every pass. Nothing in
/// here survives into the next frame; capacity does.
struct FrameData {
    groups: Vec<ModelGroup>,
    records: Vec<InstanceRecord>,
    stencil: Vec<StencilState>,
    lighting_states: Vec<LightingState>,
    flashlights: Vec<FlashlightState>,
    arena: FrameArena,
}

impl FrameData {
    fn new() -> Self {
        Self {
            groups: Vec::new(),
            records: Vec::new(),
            stencil: Vec::new(),
            lighting_states: Vec::new(),
            flashlights: Vec::new(),
            arena: FrameArena::new(),
        }
    }

    fn reset(&mut self) {
        self.groups.clear();
        self.records.clear();
        self.stencil.clear();
        self.lighting_states.clear();
        self.flashlights.clear();
        self.arena.reset();
    }
}

/// Per-input-index render data for caller-side translucent sorting. The
/// tables are value copies: they stay valid after the scheduler's own
/// scratch is reset, until handed back to
/// [`ModelRenderScheduler::cleanup_translucent_render_data`].
#[derive(Debug, Default)]
pub struct TranslucentRenderData {
    pub entries: Vec<Option<TranslucentEntry>>,
    pub pose_matrices: Vec<Affine3A>,
    pub lighting_states: Vec<LightingState>,
    pub stencil_states: Vec<StencilState>,
    pub flashlights: Vec<FlashlightState>,
    cache_handles: Vec<CacheHandle>,
}

#[derive(Debug, Clone, Copy)]
pub struct TranslucentEntry {
    pub model: Handle<ModelAsset>,
    pub instance: InstanceDrawData,
}

/// The fast-path scheduler. One instance per renderer context; concurrent
/// render modes each get their own instance, since frame scratch is
/// exclusively owned for the duration of a pass.
pub struct ModelRenderScheduler {
    settings: ScheduleSettings,
    resources: FallbackResources,
    frame: FrameData,
}

impl ModelRenderScheduler {
    pub fn new(settings: ScheduleSettings, resources: FallbackResources) -> Self {
        Self {
            settings,
            resources,
            frame: FrameData::new(),
        }
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ScheduleSettings {
        &mut self.settings
    }

    /// Schedules and submits one frame's worth of instances for one render
    /// mode. Runs to completion; every failure mode inside degrades to a
    /// missing or neutrally-lit draw, never a failed frame.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_models(
        &mut self,
        instances: &[RenderInstance],
        models: &ModelCache,
        mode: RenderMode,
        backend: &mut dyn RenderBackend,
        projection: &dyn ScreenProjection,
        time: f32,
    ) -> FrameSummary {
        if instances.is_empty() || self.settings.skip_fast_path {
            return FrameSummary::default();
        }

        let frame = &mut self.frame;
        frame.reset();

        let stencil_instances = build_groups(
            instances,
            models,
            mode,
            &mut frame.groups,
            &mut frame.stencil,
        );
        ordering::sort_groups_by_dependency(&mut frame.groups, self.settings.deferred_stencil);
        let lighting_lists = ordering::build_lighting_lists(&frame.groups);
        ordering::verify_dependency_order(&frame.groups, instances);

        lod::select_lods(
            &mut frame.groups,
            instances,
            models,
            mode,
            &self.settings,
            projection,
        );
        records::expand_and_sort(&mut frame.groups, instances, &mut frame.records);

        let pose_stats = pose::resolve_poses(
            &frame.groups,
            instances,
            models,
            &mut frame.records,
            &mut frame.arena,
            time,
        );
        if mode != RenderMode::RttShadow {
            pose::resolve_weights(
                &frame.groups,
                instances,
                models,
                &mut frame.records,
                &mut frame.arena,
                self.settings.flex_smooth,
            );
        }

        let cache_handles = if mode.is_standard() {
            let handles = lighting::classify_and_light(
                &lighting_lists,
                &frame.groups,
                instances,
                models,
                &mut frame.records,
                &mut frame.lighting_states,
                backend,
                self.resources.default_cubemap,
            );
            affectors::bind_affectors(
                &mut frame.groups,
                &mut frame.records,
                &mut frame.flashlights,
                backend,
            );
            handles
        } else {
            Vec::new()
        };

        modulation::modulate_colors(&mut frame.records, instances);

        // The lighting lists hold positions into the ordered group list and
        // are consumed above; only now is it safe to resort for the split
        // stencil submission.
        if self.settings.deferred_stencil && mode.is_standard() && stencil_instances > 0 {
            ordering::stencil_tail_sort(&mut frame.groups);
        }

        let stats = dispatch::dispatch(
            &frame.groups,
            &frame.records,
            instances,
            models,
            &frame.arena,
            &frame.lighting_states,
            &frame.stencil,
            &frame.flashlights,
            mode,
            &self.settings,
            &self.resources,
            backend,
        );

        if !cache_handles.is_empty() {
            backend.release_static_lighting(&cache_handles);
        }

        let summary = FrameSummary {
            group_count: frame.groups.len(),
            stencil_instance_count: stencil_instances,
            drawn_instance_count: stats.instances,
            bone_setup_count: pose_stats.bone_setups,
            basis_conversions: pose_stats.basis_conversions,
            submissions: stats.submissions,
        };
        let (matrix_peak, scalar_peak) = frame.arena.watermarks();
        log::trace!(
            "scheduled {} instances in {} groups ({} submissions, arena peak {}m/{}s)",
            summary.drawn_instance_count,
            summary.group_count,
            summary.submissions,
            matrix_peak,
            scalar_peak
        );
        summary
    }

    /// Runs the standard-mode pipeline but, instead of dispatching, hands
    /// back per-input-index render data for caller-side translucent
    /// sorting. The caller must return the data once the draws it issued
    /// from it are in flight.
    pub fn compute_translucent_render_data(
        &mut self,
        instances: &[RenderInstance],
        models: &ModelCache,
        backend: &mut dyn RenderBackend,
        projection: &dyn ScreenProjection,
        time: f32,
    ) -> TranslucentRenderData {
        let mut out = TranslucentRenderData::default();
        if instances.is_empty() {
            return out;
        }
        let mode = RenderMode::Standard;

        let frame = &mut self.frame;
        frame.reset();

        build_groups(instances, models, mode, &mut frame.groups, &mut frame.stencil);
        ordering::sort_groups_by_dependency(&mut frame.groups, self.settings.deferred_stencil);
        let lighting_lists = ordering::build_lighting_lists(&frame.groups);
        ordering::verify_dependency_order(&frame.groups, instances);

        lod::select_lods(
            &mut frame.groups,
            instances,
            models,
            mode,
            &self.settings,
            projection,
        );
        records::expand_and_sort(&mut frame.groups, instances, &mut frame.records);
        pose::resolve_poses(
            &frame.groups,
            instances,
            models,
            &mut frame.records,
            &mut frame.arena,
            time,
        );
        pose::resolve_weights(
            &frame.groups,
            instances,
            models,
            &mut frame.records,
            &mut frame.arena,
            self.settings.flex_smooth,
        );
        out.cache_handles = lighting::classify_and_light(
            &lighting_lists,
            &frame.groups,
            instances,
            models,
            &mut frame.records,
            &mut frame.lighting_states,
            backend,
            self.resources.default_cubemap,
        );
        affectors::bind_affectors(
            &mut frame.groups,
            &mut frame.records,
            &mut frame.flashlights,
            backend,
        );
        modulation::modulate_colors(&mut frame.records, instances);

        out.entries = vec![None; instances.len()];
        for group in &frame.groups {
            if group.draw_count() == 0 {
                continue;
            }
            for record in &frame.records[group.draw_range()] {
                out.entries[record.instance_index] = Some(TranslucentEntry {
                    model: group.model,
                    instance: dispatch::pack_record(record),
                });
            }
        }
        out.pose_matrices = frame.arena.matrices.clone();
        out.lighting_states = frame.lighting_states.clone();
        out.stencil_states = frame.stencil.clone();
        out.flashlights = frame.flashlights.clone();
        out
    }

    /// Releases the baked-lighting locks held by translucent render data.
    pub fn cleanup_translucent_render_data(
        &mut self,
        backend: &mut dyn RenderBackend,
        data: TranslucentRenderData,
    ) {
        if !data.cache_handles.is_empty() {
            backend.release_static_lighting(&data.cache_handles);
        }
    }
}
