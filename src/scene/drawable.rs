use crate::scheduler::backend::{MaterialHandle, ModelInstanceHandle};
use glam::{Affine3A, Vec3};

/// Which bulk lighting pipeline computes lighting for an instance.
/// Pipelines are mutually exclusive; `None` skips lighting entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightingModel {
    None,
    Standard,
    StaticProp,
    PhysicsProp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilCompare {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

/// Requested stencil write state. Value-copied into frame storage at group
/// build time; the backend may defer the draw past the end of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilState {
    pub ref_value: u8,
    pub test_mask: u8,
    pub write_mask: u8,
    pub compare: StencilCompare,
    pub fail_op: StencilOp,
    pub zfail_op: StencilOp,
    pub pass_op: StencilOp,
}

/// Bone subset requested from [`Drawable::setup_bones`]. Vertex bones for
/// the selected LOD, plus attachment bones when the lighting origin rides
/// an attachment.
#[derive(Debug, Clone, Copy)]
pub struct BoneMask {
    pub lod: u32,
    pub include_attachments: bool,
}

/// A drawable instance as the scheduler sees it: a world placement, a model
/// instance identity, and the per-instance skeletal state callbacks.
///
/// Implementations must tolerate being called once per frame per render
/// mode; the scheduler never retains a reference past the current pass.
pub trait Drawable: Send + Sync {
    fn render_origin(&self) -> Vec3;

    fn to_world(&self) -> Affine3A;

    fn skin(&self) -> i32 {
        0
    }

    fn body(&self) -> i32 {
        0
    }

    /// Identity used by the batched decal / flashlight / lighting queries.
    fn model_instance(&self) -> ModelInstanceHandle {
        ModelInstanceHandle::INVALID
    }

    /// True when this instance copies its parent's bones instead of
    /// animating its own.
    fn is_bone_merged(&self) -> bool {
        false
    }

    /// Fill `out` with bone-local transforms for the masked bone set.
    /// Returning `false` leaves the instance on identity transforms.
    fn setup_bones(&self, mask: BoneMask, time: f32, out: &mut [Affine3A]) -> bool;

    /// Fill morph weight buffers. `delayed` is present only when weight
    /// smoothing is enabled.
    fn setup_weights(
        &self,
        bones: &[Affine3A],
        weights: &mut [f32],
        delayed: Option<&mut [f32]>,
    ) -> bool {
        let _ = (bones, weights, delayed);
        true
    }

    /// Attachment-aware lighting origin resolution. The default transforms
    /// the model's authored illumination position into world space.
    fn lighting_origin(&self, illum_position: Vec3) -> Vec3 {
        self.to_world().transform_point3(illum_position)
    }

    /// Base diffuse modulation from ownership state (team color, cloak, ...).
    fn color_modulation(&self) -> Vec3 {
        Vec3::ONE
    }

    /// Material used when this instance renders into a texture shadow.
    fn shadow_material(&self) -> Option<MaterialHandle> {
        None
    }
}

/// Optional capability of a [`Drawable`]: instances without it still get
/// bone setup (they may be a dependency of an attached child) but never
/// produce a draw call.
pub trait ModelRenderable: Send + Sync {
    fn lighting_model(&self) -> LightingModel;

    /// Stencil write request, queried only in standard render mode.
    /// `None` means this instance does not touch stencil.
    fn stencil_state(&self) -> Option<StencilState>;
}
