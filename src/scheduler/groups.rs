use super::RenderMode;
use crate::asset::{Handle, ModelAsset, ModelCache, ModelFlags};
use crate::scene::{LightingModel, RenderInstance, StencilState};
use std::collections::HashSet;
use std::ops::Range;

/// Per-instance bookkeeping inside a group, before expansion into records.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModelListNode {
    pub instance: usize,
    pub lod: u32,
    pub bone_merge: bool,
    pub stencil: Option<u32>,
}

/// One bucket of instances sharing (model, lighting pipeline, stencil flag).
///
/// Bucketing by lighting pipeline is not strictly necessary, but it keeps
/// the bulk lighting fan-out trivially partitioned; the same model showing
/// up under two pipelines splits into two groups and still shares pose
/// amortization within each.
pub struct ModelGroup {
    pub model: Handle<ModelAsset>,
    pub lighting_model: LightingModel,
    pub wants_stencil: bool,
    /// Hardware data could not be resolved; the group exists only so
    /// dependents keep a consistent depth ordering.
    pub lod_unavailable: bool,
    pub parent_depth: u32,
    pub(crate) nodes: Vec<ModelListNode>,
    /// All records of this group, bone-setup-only members first.
    pub(crate) records: Range<usize>,
    pub(crate) setup_only: usize,
    /// Dynamic-light affectors applying to this frame's submission,
    /// mirrored onto every group.
    pub flashlight_count: usize,
}

impl ModelGroup {
    fn new(
        model: Handle<ModelAsset>,
        lighting_model: LightingModel,
        wants_stencil: bool,
        lod_unavailable: bool,
    ) -> Self {
        Self {
            model,
            lighting_model,
            wants_stencil,
            lod_unavailable,
            parent_depth: 0,
            nodes: Vec::new(),
            records: 0..0,
            setup_only: 0,
            flashlight_count: 0,
        }
    }

    pub fn member_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn record_range(&self) -> Range<usize> {
        self.records.clone()
    }

    /// Records that actually produce a draw call: everything past the
    /// bone-setup-only prefix.
    pub(crate) fn draw_range(&self) -> Range<usize> {
        self.records.start + self.setup_only..self.records.end
    }

    pub fn draw_count(&self) -> usize {
        if self.lod_unavailable {
            0
        } else {
            self.records.len() - self.setup_only
        }
    }
}

/// Number of attachment hops up to a root with no bone-setup dependency.
/// Chains are expected short; the walk is bounded by the table length so a
/// malformed cycle degrades into an arbitrary (but total) ordering instead
/// of hanging.
pub(crate) fn compute_parent_depth(instances: &[RenderInstance], index: usize) -> u32 {
    let mut depth = 0u32;
    let mut current = instances[index].attachment_parent;
    let mut hops = 0usize;
    while let Some(parent) = current {
        if parent >= instances.len() || hops >= instances.len() {
            break;
        }
        depth += 1;
        hops += 1;
        current = instances[parent].attachment_parent;
    }
    depth
}

/// Buckets the instance list into groups. Returns the number of instances
/// requesting stencil writes.
pub(crate) fn build_groups(
    instances: &[RenderInstance],
    models: &ModelCache,
    mode: RenderMode,
    groups: &mut Vec<ModelGroup>,
    stencil_table: &mut Vec<StencilState>,
) -> usize {
    let mut stencil_instances = 0usize;
    let mut warned_missing_renderable: HashSet<Handle<ModelAsset>> = HashSet::new();

    for (index, instance) in instances.iter().enumerate() {
        let Some(asset) = models.get(instance.model) else {
            log::warn!("dropping instance {index}: stale model handle {:?}", instance.model);
            continue;
        };

        // Excluded models render nowhere and need no bone setup.
        if asset.flags.contains(ModelFlags::RENDER_DISABLED) {
            continue;
        }

        let mut lighting_model = LightingModel::None;
        let mut stencil_state = None;
        match &instance.model_renderable {
            Some(renderable) => {
                lighting_model = renderable.lighting_model();
                if mode.is_standard() {
                    stencil_state = renderable.stencil_state();
                }
            }
            None => {
                if warned_missing_renderable.insert(instance.model) {
                    log::debug!("no model renderable for '{}'", asset.name);
                }
            }
        }
        let wants_stencil = stencil_state.is_some();

        let slot = groups.iter().position(|group| {
            group.model == instance.model
                && group.lighting_model == lighting_model
                && group.wants_stencil == wants_stencil
        });

        let slot = match slot {
            Some(slot) => slot,
            None => {
                // Shadow passes skip models that never cast shadows, unless
                // the instance is a bone-setup dependency we must keep.
                if !mode.is_standard()
                    && instance.model_renderable.is_some()
                    && !asset.casts_shadows()
                {
                    continue;
                }

                let lod_unavailable = match models.hardware(instance.model) {
                    Ok(_) => false,
                    Err(err) => {
                        log::info!("group kept without draw data: {err}");
                        true
                    }
                };

                groups.push(ModelGroup::new(
                    instance.model,
                    lighting_model,
                    wants_stencil,
                    lod_unavailable,
                ));
                groups.len() - 1
            }
        };

        let stencil = stencil_state.map(|state| {
            stencil_table.push(state);
            (stencil_table.len() - 1) as u32
        });
        stencil_instances += usize::from(wants_stencil);

        let depth = compute_parent_depth(instances, index);
        let group = &mut groups[slot];
        group.parent_depth = group.parent_depth.max(depth);
        group.nodes.push(ModelListNode {
            instance: index,
            lod: 0,
            bone_merge: instance.drawable.is_bone_merged(),
            stencil,
        });
    }

    stencil_instances
}
