use super::groups::ModelGroup;
use crate::scene::{LightingModel, RenderInstance};
use std::cmp::Ordering;

/// Orders groups so bone setup resolves parents before children.
///
/// Primary key: parent depth. Secondary, only on platforms that defer
/// stencil draws: stencil-writing groups later. That key is strictly
/// subordinate to depth, so a child can never land ahead of its unresolved
/// parent.
/// Tertiary: model identity, keeping same-model groups with different
/// lighting pipelines adjacent. The sort is stable, so remaining ties keep
/// insertion order and frames stay reproducible.
pub(crate) fn sort_groups_by_dependency(groups: &mut [ModelGroup], deferred_stencil: bool) {
    groups.sort_by(|a, b| {
        a.parent_depth
            .cmp(&b.parent_depth)
            .then_with(|| {
                if deferred_stencil {
                    a.wants_stencil.cmp(&b.wants_stencil)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.model.cmp(&b.model))
    });
}

/// Pulls every stencil-writing group to the tail for the split submission.
/// Runs only after pose resolution, when draw order no longer has to honor
/// bone-setup dependencies.
pub(crate) fn stencil_tail_sort(groups: &mut [ModelGroup]) {
    groups.sort_by(|a, b| {
        a.wants_stencil
            .cmp(&b.wants_stencil)
            .then_with(|| a.model.cmp(&b.model))
    });
}

/// Groups of one lighting pipeline, by position in the ordered group list.
/// Valid only until the groups are reordered again (stencil tail sort).
#[derive(Debug, Default)]
pub(crate) struct LightingList {
    pub groups: Vec<usize>,
    pub member_count: usize,
}

#[derive(Debug, Default)]
pub(crate) struct LightingLists {
    pub standard: LightingList,
    pub static_prop: LightingList,
    pub physics_prop: LightingList,
}

pub(crate) fn build_lighting_lists(groups: &[ModelGroup]) -> LightingLists {
    let mut lists = LightingLists::default();
    for (index, group) in groups.iter().enumerate() {
        let list = match group.lighting_model {
            LightingModel::None => continue,
            LightingModel::Standard => &mut lists.standard,
            LightingModel::StaticProp => &mut lists.static_prop,
            LightingModel::PhysicsProp => &mut lists.physics_prop,
        };
        list.groups.push(index);
        list.member_count += group.member_count();
    }
    lists
}

/// Debug-only diagnosis of the documented no-mutual-dependency invariant:
/// every ancestor's group must sit at a strictly smaller depth. Release
/// builds skip the walk and live with whatever total order the depths gave.
#[cfg(debug_assertions)]
pub(crate) fn verify_dependency_order(groups: &[ModelGroup], instances: &[RenderInstance]) {
    let mut group_of_instance = vec![usize::MAX; instances.len()];
    for (index, group) in groups.iter().enumerate() {
        for node in &group.nodes {
            group_of_instance[node.instance] = index;
        }
    }

    for group in groups {
        if group.parent_depth == 0 {
            continue;
        }
        for node in &group.nodes {
            let mut hops = 0usize;
            let mut current = instances[node.instance].attachment_parent;
            while let Some(parent) = current {
                if parent >= instances.len() || hops >= instances.len() {
                    break;
                }
                let ancestor_group = group_of_instance[parent];
                if ancestor_group != usize::MAX
                    && groups[ancestor_group].parent_depth >= group.parent_depth
                {
                    log::warn!(
                        "bone setup dependency ordering issue: instance {} depends on instance {}",
                        node.instance,
                        parent
                    );
                }
                hops += 1;
                current = instances[parent].attachment_parent;
            }
        }
    }
}

#[cfg(not(debug_assertions))]
pub(crate) fn verify_dependency_order(_groups: &[ModelGroup], _instances: &[RenderInstance]) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Handle;

    fn group(model: usize, depth: u32, stencil: bool, lighting: LightingModel) -> ModelGroup {
        let mut g = ModelGroup {
            model: Handle::new(model),
            lighting_model: lighting,
            wants_stencil: stencil,
            lod_unavailable: false,
            parent_depth: depth,
            nodes: Vec::new(),
            records: 0..0,
            setup_only: 0,
            flashlight_count: 0,
        };
        g.nodes.push(super::super::groups::ModelListNode {
            instance: 0,
            lod: 0,
            bone_merge: false,
            stencil: None,
        });
        g
    }

    #[test]
    fn parents_sort_before_children() {
        let mut groups = vec![
            group(0, 2, false, LightingModel::Standard),
            group(1, 0, false, LightingModel::Standard),
            group(2, 1, false, LightingModel::Standard),
        ];
        sort_groups_by_dependency(&mut groups, false);
        let depths: Vec<_> = groups.iter().map(|g| g.parent_depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
    }

    #[test]
    fn stencil_key_is_subordinate_to_depth() {
        let mut groups = vec![
            group(0, 1, false, LightingModel::Standard),
            group(1, 0, true, LightingModel::Standard),
            group(2, 0, false, LightingModel::Standard),
        ];
        sort_groups_by_dependency(&mut groups, true);

        // Depth still wins: the stencil group at depth 0 cannot sink past
        // the depth-1 group, only past its depth-0 sibling.
        assert_eq!(groups[0].parent_depth, 0);
        assert!(!groups[0].wants_stencil);
        assert!(groups[1].wants_stencil);
        assert_eq!(groups[2].parent_depth, 1);
    }

    #[test]
    fn stencil_tail_sort_ignores_depth() {
        let mut groups = vec![
            group(0, 0, true, LightingModel::Standard),
            group(1, 1, false, LightingModel::Standard),
        ];
        stencil_tail_sort(&mut groups);
        assert!(!groups[0].wants_stencil);
        assert!(groups[1].wants_stencil);
    }

    #[test]
    fn lighting_lists_partition_groups() {
        let groups = vec![
            group(0, 0, false, LightingModel::Standard),
            group(1, 0, false, LightingModel::StaticProp),
            group(2, 0, false, LightingModel::None),
            group(3, 0, false, LightingModel::PhysicsProp),
            group(4, 0, false, LightingModel::Standard),
        ];
        let lists = build_lighting_lists(&groups);

        assert_eq!(lists.standard.groups, vec![0, 4]);
        assert_eq!(lists.static_prop.groups, vec![1]);
        assert_eq!(lists.physics_prop.groups, vec![3]);
        assert_eq!(lists.standard.member_count, 2);
    }
}
