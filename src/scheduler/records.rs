use super::backend::{ColorMeshHandle, DecalHandle, ModelInstanceHandle, TextureHandle};
use super::groups::ModelGroup;
use super::internal::arena::ArenaRange;
use crate::scene::RenderInstance;
use glam::Vec4;

/// Per-instance expanded record used by every stage after grouping.
/// Allocated per frame and reset in bulk; anything it indexes (arena
/// matrices, lighting states, stencil table) has the same lifetime.
#[derive(Debug, Clone)]
pub(crate) struct InstanceRecord {
    pub instance_index: usize,
    pub lod: u32,
    pub skin: i32,
    pub body: i32,
    pub model_instance: ModelInstanceHandle,
    /// No draw capability: the record exists only so dependents can read
    /// its resolved bones.
    pub setup_bones_only: bool,
    pub bone_merge: bool,
    pub stencil: Option<u32>,
    pub bone_to_world: ArenaRange,
    pub pose_to_world: ArenaRange,
    pub weights: ArenaRange,
    pub delayed_weights: ArenaRange,
    pub lighting_state: Option<u32>,
    pub decal_lighting_state: Option<u32>,
    pub env_cubemap: Option<TextureHandle>,
    pub color_mesh: Option<ColorMeshHandle>,
    pub decal: DecalHandle,
    pub flashlight_usage: u32,
    pub diffuse_modulation: Vec4,
}

impl InstanceRecord {
    fn from_node(
        node: &super::groups::ModelListNode,
        instance: &RenderInstance,
    ) -> Self {
        Self {
            instance_index: node.instance,
            lod: node.lod,
            skin: instance.drawable.skin(),
            body: instance.drawable.body(),
            model_instance: instance.drawable.model_instance(),
            setup_bones_only: instance.model_renderable.is_none(),
            bone_merge: node.bone_merge,
            stencil: node.stencil,
            bone_to_world: ArenaRange::EMPTY,
            pose_to_world: ArenaRange::EMPTY,
            weights: ArenaRange::EMPTY,
            delayed_weights: ArenaRange::EMPTY,
            lighting_state: None,
            decal_lighting_state: None,
            env_cubemap: None,
            color_mesh: None,
            decal: DecalHandle::INVALID,
            flashlight_usage: 0,
            diffuse_modulation: Vec4::ONE,
        }
    }
}

/// Expands group nodes into contiguous record slices and sorts each slice
/// for batch submission: bone-setup-only records lead (they never draw),
/// then skin, LOD and body descending so the backend sees contiguous runs
/// it can submit without rebinding.
pub(crate) fn expand_and_sort(
    groups: &mut [ModelGroup],
    instances: &[RenderInstance],
    records: &mut Vec<InstanceRecord>,
) {
    for group in groups.iter_mut() {
        let start = records.len();
        for node in &group.nodes {
            records.push(InstanceRecord::from_node(node, &instances[node.instance]));
        }
        let slice = &mut records[start..];
        slice.sort_by(|a, b| {
            b.setup_bones_only
                .cmp(&a.setup_bones_only)
                .then_with(|| b.skin.cmp(&a.skin))
                .then_with(|| b.lod.cmp(&a.lod))
                .then_with(|| b.body.cmp(&a.body))
        });

        group.setup_only = slice.iter().filter(|r| r.setup_bones_only).count();
        group.records = start..records.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{HardwareData, LodMetricTable, ModelAsset, ModelCache, ModelFlags, Skeleton};
    use crate::scene::drawable::{Drawable, LightingModel, ModelRenderable, StencilState};
    use crate::scene::BoneMask;
    use crate::scheduler::groups::build_groups;
    use crate::scheduler::RenderMode;
    use glam::{Affine3A, Vec3};
    use std::sync::Arc;

    struct VariantDrawable {
        skin: i32,
        body: i32,
    }

    impl Drawable for VariantDrawable {
        fn render_origin(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn to_world(&self) -> Affine3A {
            Affine3A::IDENTITY
        }

        fn skin(&self) -> i32 {
            self.skin
        }

        fn body(&self) -> i32 {
            self.body
        }

        fn setup_bones(&self, _: BoneMask, _: f32, _: &mut [Affine3A]) -> bool {
            true
        }
    }

    struct PlainRenderable;

    impl ModelRenderable for PlainRenderable {
        fn lighting_model(&self) -> LightingModel {
            LightingModel::Standard
        }

        fn stencil_state(&self) -> Option<StencilState> {
            None
        }
    }

    #[test]
    fn records_sort_setup_only_first_then_variants_descending() {
        let mut cache = ModelCache::new();
        let model = cache.insert(
            ModelAsset::new("props/sort", ModelFlags::empty(), Skeleton::single_bone())
                .with_hardware(HardwareData {
                    lod_count: 1,
                    root_lod: 0,
                    metric: LodMetricTable::single_lod(),
                }),
        );

        let drawable = |skin, body| Arc::new(VariantDrawable { skin, body });
        let instances = vec![
            RenderInstance::new(model, drawable(1, 0)).with_renderable(Arc::new(PlainRenderable)),
            // No renderable: bone-setup-only, must lead despite highest skin.
            RenderInstance::new(model, drawable(9, 9)),
            RenderInstance::new(model, drawable(2, 1)).with_renderable(Arc::new(PlainRenderable)),
            RenderInstance::new(model, drawable(2, 3)).with_renderable(Arc::new(PlainRenderable)),
        ];

        let mut groups = Vec::new();
        let mut stencil = Vec::new();
        build_groups(&instances, &cache, RenderMode::Standard, &mut groups, &mut stencil);
        assert_eq!(groups.len(), 1);

        let mut records = Vec::new();
        expand_and_sort(&mut groups, &instances, &mut records);

        assert_eq!(groups[0].setup_only, 1);
        assert!(records[0].setup_bones_only);

        let drawn: Vec<(i32, i32)> = records[groups[0].draw_range()]
            .iter()
            .map(|r| (r.skin, r.body))
            .collect();
        assert_eq!(drawn, vec![(2, 3), (2, 1), (1, 0)]);
    }

    #[test]
    fn every_instance_lands_in_exactly_one_record() {
        let mut cache = ModelCache::new();
        let a = cache.insert(
            ModelAsset::new("props/a", ModelFlags::empty(), Skeleton::single_bone()).with_hardware(
                HardwareData {
                    lod_count: 1,
                    root_lod: 0,
                    metric: LodMetricTable::single_lod(),
                },
            ),
        );
        let b = cache.insert(
            ModelAsset::new("props/b", ModelFlags::empty(), Skeleton::single_bone()).with_hardware(
                HardwareData {
                    lod_count: 1,
                    root_lod: 0,
                    metric: LodMetricTable::single_lod(),
                },
            ),
        );

        let instances: Vec<_> = [a, b, a, b, a]
            .into_iter()
            .map(|model| {
                RenderInstance::new(model, Arc::new(VariantDrawable { skin: 0, body: 0 }))
                    .with_renderable(Arc::new(PlainRenderable))
            })
            .collect();

        let mut groups = Vec::new();
        let mut stencil = Vec::new();
        build_groups(&instances, &cache, RenderMode::Standard, &mut groups, &mut stencil);
        let mut records = Vec::new();
        expand_and_sort(&mut groups, &instances, &mut records);

        let mut seen: Vec<usize> = records.iter().map(|r| r.instance_index).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
