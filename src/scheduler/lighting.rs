use super::backend::{
    LightingQuery, LightingState, RenderBackend, StaticLightingQuery, TextureHandle,
};
use super::groups::ModelGroup;
use super::ordering::LightingList;
use super::records::InstanceRecord;
use crate::asset::{ModelCache, ModelFlags};
use crate::error::ScheduleError;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct LightingUsage: u8 {
        const ENV_CUBEMAP = 0x1;
        const VERTEX_LIT  = 0x2;
        const STATIC_LIT  = 0x4;
    }
}

fn usage_for(flags: ModelFlags) -> LightingUsage {
    let mut usage = LightingUsage::empty();
    if flags.contains(ModelFlags::USES_ENV_CUBEMAP) {
        usage |= LightingUsage::ENV_CUBEMAP;
    }
    if flags.contains(ModelFlags::VERTEX_LIT) {
        usage |= LightingUsage::VERTEX_LIT;
    }
    if flags.contains(ModelFlags::STATIC_LIT) {
        usage |= LightingUsage::STATIC_LIT;
    }
    usage
}

/// Selects the groups of one pipeline that actually need lighting. Models
/// using neither vertex lighting, env cubemaps nor baked lighting skip the
/// pass outright.
fn build_setup_list(
    list: &LightingList,
    groups: &[ModelGroup],
    models: &ModelCache,
) -> (Vec<(usize, LightingUsage)>, usize) {
    let mut setup = Vec::with_capacity(list.groups.len());
    let mut total = 0usize;
    for &index in &list.groups {
        let group = &groups[index];
        let Some(asset) = models.get(group.model) else {
            continue;
        };
        let usage = usage_for(asset.flags);
        if usage.is_empty() || group.draw_count() == 0 {
            continue;
        }
        setup.push((index, usage));
        total += group.draw_count();
    }
    (setup, total)
}

fn lighting_origin(
    record: &InstanceRecord,
    instances: &[crate::scene::RenderInstance],
    models: &ModelCache,
    group: &ModelGroup,
) -> glam::Vec3 {
    let illum = models
        .get(group.model)
        .map(|asset| asset.skeleton.illum_position)
        .unwrap_or_default();
    instances[record.instance_index].drawable.lighting_origin(illum)
}

/// Static-prop and physics-prop lighting share one shape: a single batched
/// query that also locks baked color meshes. Returns the cache handles to
/// release after dispatch.
fn setup_static_style_lighting(
    list: &LightingList,
    groups: &[ModelGroup],
    instances: &[crate::scene::RenderInstance],
    models: &ModelCache,
    records: &mut [InstanceRecord],
    lighting_states: &mut Vec<LightingState>,
    backend: &mut dyn RenderBackend,
    default_cubemap: TextureHandle,
) -> Vec<super::backend::CacheHandle> {
    if list.groups.is_empty() {
        return Vec::new();
    }
    let (setup, total) = build_setup_list(list, groups, models);
    if setup.is_empty() {
        return Vec::new();
    }

    let mut queries = Vec::with_capacity(total);
    for &(index, _) in &setup {
        let group = &groups[index];
        for record in &records[group.draw_range()] {
            queries.push(StaticLightingQuery {
                origin: lighting_origin(record, instances, models, group),
                instance: record.model_instance,
            });
        }
    }

    let results = backend.compute_static_lighting(&queries);
    if results.states.len() < total
        || results.env_cubemaps.len() < total
        || results.color_meshes.len() < total
    {
        log::warn!(
            "static lighting: {}",
            ScheduleError::QueryShortfall {
                expected: total,
                got: results.states.len()
            }
        );
        return results.cache_handles;
    }

    let mut offset = 0usize;
    for &(index, usage) in &setup {
        let group = &groups[index];
        for (j, record) in records[group.draw_range()].iter_mut().enumerate() {
            let at = offset + j;
            if usage.contains(LightingUsage::ENV_CUBEMAP) {
                record.env_cubemap = Some(results.env_cubemaps[at].unwrap_or(default_cubemap));
            }
            if usage.contains(LightingUsage::VERTEX_LIT) {
                lighting_states.push(results.states[at]);
                record.lighting_state = Some((lighting_states.len() - 1) as u32);
                if let Some(decal_state) = results.decal_states.get(at) {
                    lighting_states.push(*decal_state);
                    record.decal_lighting_state = Some((lighting_states.len() - 1) as u32);
                }
            }
            if usage.contains(LightingUsage::STATIC_LIT) {
                record.color_mesh = results.color_meshes[at];
            }
        }
        offset += group.draw_count();
    }

    results.cache_handles
}

fn setup_standard_lighting(
    list: &LightingList,
    groups: &[ModelGroup],
    instances: &[crate::scene::RenderInstance],
    models: &ModelCache,
    records: &mut [InstanceRecord],
    lighting_states: &mut Vec<LightingState>,
    backend: &mut dyn RenderBackend,
    default_cubemap: TextureHandle,
) {
    if list.groups.is_empty() {
        return;
    }
    let (setup, total) = build_setup_list(list, groups, models);
    if setup.is_empty() {
        return;
    }

    let mut queries = Vec::with_capacity(total);
    for &(index, _) in &setup {
        let group = &groups[index];
        let ambient_boost = models
            .get(group.model)
            .map(|asset| asset.flags.contains(ModelFlags::AMBIENT_BOOST))
            .unwrap_or(false);
        for record in &records[group.draw_range()] {
            queries.push(LightingQuery {
                origin: lighting_origin(record, instances, models, group),
                instance: record.model_instance,
                ambient_boost,
            });
        }
    }

    let results = backend.compute_lighting(&queries);
    if results.states.len() < total || results.env_cubemaps.len() < total {
        log::warn!(
            "standard lighting: {}",
            ScheduleError::QueryShortfall {
                expected: total,
                got: results.states.len()
            }
        );
        return;
    }

    let mut offset = 0usize;
    for &(index, usage) in &setup {
        let group = &groups[index];
        for (j, record) in records[group.draw_range()].iter_mut().enumerate() {
            let at = offset + j;
            if usage.contains(LightingUsage::ENV_CUBEMAP) {
                record.env_cubemap = Some(results.env_cubemaps[at].unwrap_or(default_cubemap));
            }
            if usage.contains(LightingUsage::VERTEX_LIT) {
                lighting_states.push(results.states[at]);
                record.lighting_state = Some((lighting_states.len() - 1) as u32);
            }
        }
        offset += group.draw_count();
    }
}

/// Issues at most one batched lighting query per pipeline and fans the
/// results back into per-record storage. Writes are partitioned by group,
/// so no record is touched by two pipelines.
pub(crate) fn classify_and_light(
    lists: &super::ordering::LightingLists,
    groups: &[ModelGroup],
    instances: &[crate::scene::RenderInstance],
    models: &ModelCache,
    records: &mut [InstanceRecord],
    lighting_states: &mut Vec<LightingState>,
    backend: &mut dyn RenderBackend,
    default_cubemap: TextureHandle,
) -> Vec<super::backend::CacheHandle> {
    let mut cache_handles = setup_static_style_lighting(
        &lists.static_prop,
        groups,
        instances,
        models,
        records,
        lighting_states,
        backend,
        default_cubemap,
    );
    setup_standard_lighting(
        &lists.standard,
        groups,
        instances,
        models,
        records,
        lighting_states,
        backend,
        default_cubemap,
    );
    // Physics props always consume their baked lighting; moving or
    // bump-mapped props were routed to the standard pipeline upstream.
    cache_handles.extend(setup_static_style_lighting(
        &lists.physics_prop,
        groups,
        instances,
        models,
        records,
        lighting_states,
        backend,
        default_cubemap,
    ));
    cache_handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{HardwareData, LodMetricTable, ModelAsset, ModelCache, Skeleton};
    use crate::scene::drawable::{Drawable, LightingModel, ModelRenderable, StencilState};
    use crate::scene::{BoneMask, RenderInstance};
    use crate::scheduler::backend::{
        ArraySubmission, CacheHandle, ColorMeshHandle, DecalHandle, FlashlightInfo,
        LightingResults, MaterialHandle, ModelInstanceHandle, StaticLightingResults,
    };
    use crate::scheduler::groups::build_groups;
    use crate::scheduler::ordering::build_lighting_lists;
    use crate::scheduler::records::expand_and_sort;
    use crate::scheduler::RenderMode;
    use glam::{Affine3A, Vec3};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingBackend {
        standard_queries: usize,
        static_queries: usize,
        short: bool,
    }

    impl RenderBackend for CountingBackend {
        fn compute_lighting(&mut self, queries: &[LightingQuery]) -> LightingResults {
            self.standard_queries += 1;
            let n = if self.short {
                queries.len().saturating_sub(1)
            } else {
                queries.len()
            };
            LightingResults {
                states: vec![LightingState::default(); n],
                env_cubemaps: vec![None; n],
            }
        }

        fn compute_static_lighting(
            &mut self,
            queries: &[StaticLightingQuery],
        ) -> StaticLightingResults {
            self.static_queries += 1;
            StaticLightingResults {
                states: vec![LightingState::default(); queries.len()],
                decal_states: vec![LightingState::default(); queries.len()],
                color_meshes: vec![Some(ColorMeshHandle(7)); queries.len()],
                env_cubemaps: vec![None; queries.len()],
                cache_handles: vec![CacheHandle(1)],
            }
        }

        fn decal_handles(&mut self, instances: &[ModelInstanceHandle]) -> Vec<DecalHandle> {
            vec![DecalHandle::INVALID; instances.len()]
        }

        fn flashlight_info(&mut self, _: &[ModelInstanceHandle], _: usize) -> FlashlightInfo {
            FlashlightInfo::default()
        }

        fn forced_material_override(&mut self, _: Option<MaterialHandle>) {}

        fn end_depth_prepass(&mut self) {}

        fn draw_model_array(&mut self, _: &ArraySubmission<'_>) {}

        fn draw_shadow_array(&mut self, _: &ArraySubmission<'_>) {}

        fn release_static_lighting(&mut self, _: &[CacheHandle]) {}
    }

    struct TestDrawable;

    impl Drawable for TestDrawable {
        fn render_origin(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn to_world(&self) -> Affine3A {
            Affine3A::IDENTITY
        }

        fn setup_bones(&self, _: BoneMask, _: f32, _: &mut [Affine3A]) -> bool {
            true
        }
    }

    struct TestRenderable(LightingModel);

    impl ModelRenderable for TestRenderable {
        fn lighting_model(&self) -> LightingModel {
            self.0
        }

        fn stencil_state(&self) -> Option<StencilState> {
            None
        }
    }

    fn model(name: &str, flags: ModelFlags) -> ModelAsset {
        ModelAsset::new(name, flags, Skeleton::single_bone()).with_hardware(HardwareData {
            lod_count: 1,
            root_lod: 0,
            metric: LodMetricTable::single_lod(),
        })
    }

    fn run(
        cache: &ModelCache,
        instances: &[RenderInstance],
        backend: &mut CountingBackend,
    ) -> (Vec<ModelGroup>, Vec<InstanceRecord>, Vec<LightingState>) {
        let mut groups = Vec::new();
        let mut stencil = Vec::new();
        build_groups(instances, cache, RenderMode::Standard, &mut groups, &mut stencil);
        let mut records = Vec::new();
        expand_and_sort(&mut groups, instances, &mut records);
        let lists = build_lighting_lists(&groups);
        let mut states = Vec::new();
        classify_and_light(
            &lists,
            &groups,
            instances,
            cache,
            &mut records,
            &mut states,
            backend,
            TextureHandle(0),
        );
        (groups, records, states)
    }

    fn instance(
        model: crate::asset::Handle<ModelAsset>,
        lighting: LightingModel,
    ) -> RenderInstance {
        RenderInstance::new(model, Arc::new(TestDrawable))
            .with_renderable(Arc::new(TestRenderable(lighting)))
    }

    #[test]
    fn one_batched_query_per_pipeline() {
        let mut cache = ModelCache::new();
        let lit = cache.insert(model("props/lit", ModelFlags::VERTEX_LIT));
        let baked = cache.insert(model("props/baked", ModelFlags::STATIC_LIT));

        let instances = vec![
            instance(lit, LightingModel::Standard),
            instance(lit, LightingModel::Standard),
            instance(baked, LightingModel::StaticProp),
            instance(baked, LightingModel::PhysicsProp),
        ];

        let mut backend = CountingBackend::default();
        run(&cache, &instances, &mut backend);

        assert_eq!(backend.standard_queries, 1);
        // Static-prop and physics-prop pipelines each issue one call.
        assert_eq!(backend.static_queries, 2);
    }

    #[test]
    fn unlit_models_skip_lighting_entirely() {
        let mut cache = ModelCache::new();
        let unlit = cache.insert(model("props/unlit", ModelFlags::empty()));

        let instances = vec![instance(unlit, LightingModel::Standard)];
        let mut backend = CountingBackend::default();
        let (_, records, states) = run(&cache, &instances, &mut backend);

        assert_eq!(backend.standard_queries, 0);
        assert!(states.is_empty());
        assert!(records[0].lighting_state.is_none());
    }

    #[test]
    fn results_fan_out_by_usage_flags() {
        let mut cache = ModelCache::new();
        let baked = cache.insert(model(
            "props/baked",
            ModelFlags::STATIC_LIT | ModelFlags::USES_ENV_CUBEMAP,
        ));

        let instances = vec![instance(baked, LightingModel::StaticProp)];
        let mut backend = CountingBackend::default();
        let (_, records, _) = run(&cache, &instances, &mut backend);

        assert_eq!(records[0].color_mesh, Some(ColorMeshHandle(7)));
        // Backend returned no cubemap; the default must be substituted.
        assert_eq!(records[0].env_cubemap, Some(TextureHandle(0)));
        assert!(records[0].lighting_state.is_none());
    }

    #[test]
    fn shortfall_leaves_instances_unlit() {
        let mut cache = ModelCache::new();
        let lit = cache.insert(model("props/lit", ModelFlags::VERTEX_LIT));

        let instances = vec![
            instance(lit, LightingModel::Standard),
            instance(lit, LightingModel::Standard),
        ];
        let mut backend = CountingBackend {
            short: true,
            ..CountingBackend::default()
        };
        let (_, records, states) = run(&cache, &instances, &mut backend);

        assert!(states.is_empty());
        assert!(records.iter().all(|r| r.lighting_state.is_none()));
    }
}
