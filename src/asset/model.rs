use bitflags::bitflags;
use glam::{Affine3A, Vec3};

bitflags! {
    /// Authored per-model properties consulted during scheduling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModelFlags: u32 {
        /// Administratively excluded from rendering everywhere.
        const RENDER_DISABLED     = 1 << 0;
        const DO_NOT_CAST_SHADOWS = 1 << 1;
        /// Last LOD slot is a dedicated shadow mesh, not a view LOD.
        const HAS_SHADOW_LOD      = 1 << 2;
        const AMBIENT_BOOST       = 1 << 3;
        const VERTEX_LIT          = 1 << 4;
        const STATIC_LIT          = 1 << 5;
        const USES_ENV_CUBEMAP    = 1 << 6;
    }
}

/// Resource-authored mapping from projected screen size to a detail level.
///
/// The curve is data, not math: `metric_scale` converts a screen size into
/// the metric space the switch points were authored in, and `switch_points`
/// holds the ascending metric at which each successive (coarser) LOD kicks
/// in. A model with a single LOD has no switch points.
#[derive(Debug, Clone)]
pub struct LodMetricTable {
    metric_scale: f32,
    switch_points: Vec<f32>,
}

impl LodMetricTable {
    pub fn new(metric_scale: f32, switch_points: Vec<f32>) -> Self {
        Self {
            metric_scale,
            switch_points,
        }
    }

    pub fn single_lod() -> Self {
        Self::new(100.0, Vec::new())
    }

    pub fn metric_for_screen_size(&self, screen_size: f32) -> f32 {
        if screen_size != 0.0 {
            self.metric_scale / screen_size
        } else {
            0.0
        }
    }

    pub fn lod_for_metric(&self, metric: f32) -> usize {
        self.switch_points
            .iter()
            .take_while(|&&switch| switch <= metric)
            .count()
    }
}

/// Renderable mesh data resolved from the model's hardware-side cache entry.
/// Absent when the asset failed to load (e.g. mesh and skeleton out of sync).
#[derive(Debug, Clone)]
pub struct HardwareData {
    pub lod_count: usize,
    pub root_lod: usize,
    pub metric: LodMetricTable,
}

impl HardwareData {
    /// Highest selectable view LOD. The shadow-LOD slot, when present, is
    /// reserved for shadow rendering and never selected by distance.
    pub fn max_lod(&self, flags: ModelFlags) -> usize {
        if flags.contains(ModelFlags::HAS_SHADOW_LOD) {
            self.lod_count.saturating_sub(2)
        } else {
            self.lod_count.saturating_sub(1)
        }
    }

    pub fn coarsest_lod(&self) -> usize {
        self.lod_count.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub bone_count: usize,
    /// Static bind pose per bone, model space.
    pub bind_pose: Vec<Affine3A>,
    /// Model-space position used to resolve the lighting origin.
    pub illum_position: Vec3,
    /// Attachment carrying the illumination position, when it rides one.
    pub illum_attachment: Option<u16>,
    pub morph_weight_count: usize,
}

impl Skeleton {
    pub fn single_bone() -> Self {
        Self {
            bone_count: 1,
            bind_pose: vec![Affine3A::IDENTITY],
            illum_position: Vec3::ZERO,
            illum_attachment: None,
            morph_weight_count: 0,
        }
    }

    pub fn with_bones(bone_count: usize) -> Self {
        Self {
            bone_count,
            bind_pose: vec![Affine3A::IDENTITY; bone_count],
            illum_position: Vec3::ZERO,
            illum_attachment: None,
            morph_weight_count: 0,
        }
    }

    /// Converts the static bind pose into the pose-to-bone basis used to
    /// turn bone-local transforms into world bone transforms. Called once
    /// per group per frame; the cost is amortized over every instance.
    pub fn pose_to_bone_basis(&self, out: &mut Vec<Affine3A>) {
        out.clear();
        out.extend(self.bind_pose.iter().map(Affine3A::inverse));
    }
}

pub struct ModelAsset {
    pub name: String,
    pub flags: ModelFlags,
    pub skeleton: Skeleton,
    pub hardware: Option<HardwareData>,
}

impl ModelAsset {
    pub fn new(name: impl Into<String>, flags: ModelFlags, skeleton: Skeleton) -> Self {
        Self {
            name: name.into(),
            flags,
            skeleton,
            hardware: None,
        }
    }

    pub fn with_hardware(mut self, hardware: HardwareData) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn casts_shadows(&self) -> bool {
        !self.flags.contains(ModelFlags::DO_NOT_CAST_SHADOWS)
    }

    /// Whether any lighting pipeline has work to do for this model.
    pub fn needs_lighting(&self) -> bool {
        self.flags.intersects(
            ModelFlags::VERTEX_LIT | ModelFlags::STATIC_LIT | ModelFlags::USES_ENV_CUBEMAP,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LodMetricTable {
        LodMetricTable::new(100.0, vec![2.0, 5.0, 9.0])
    }

    #[test]
    fn metric_grows_as_screen_size_shrinks() {
        let t = table();
        let mut last = -1.0;
        for size in [400.0, 120.0, 40.0, 11.0, 3.0] {
            let metric = t.metric_for_screen_size(size);
            assert!(metric > last);
            last = metric;
        }
    }

    #[test]
    fn lod_selection_is_monotonic_in_metric() {
        let t = table();
        assert_eq!(t.lod_for_metric(0.5), 0);
        assert_eq!(t.lod_for_metric(2.0), 1);
        assert_eq!(t.lod_for_metric(6.3), 2);
        assert_eq!(t.lod_for_metric(50.0), 3);
    }

    #[test]
    fn single_lod_model_always_selects_root() {
        let t = LodMetricTable::single_lod();
        assert_eq!(t.lod_for_metric(0.0), 0);
        assert_eq!(t.lod_for_metric(1.0e6), 0);
    }

    #[test]
    fn shadow_lod_slot_is_excluded_from_view_lods() {
        let hw = HardwareData {
            lod_count: 4,
            root_lod: 0,
            metric: LodMetricTable::single_lod(),
        };
        assert_eq!(hw.max_lod(ModelFlags::HAS_SHADOW_LOD), 2);
        assert_eq!(hw.max_lod(ModelFlags::empty()), 3);
        assert_eq!(hw.coarsest_lod(), 3);
    }

    #[test]
    fn pose_to_bone_basis_inverts_bind_pose() {
        let mut skeleton = Skeleton::with_bones(2);
        skeleton.bind_pose[1] = Affine3A::from_translation(Vec3::new(3.0, 0.0, 0.0));

        let mut basis = Vec::new();
        skeleton.pose_to_bone_basis(&mut basis);

        let round_trip = skeleton.bind_pose[1] * basis[1];
        let p = round_trip.transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!((p - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }
}
