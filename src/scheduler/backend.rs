use crate::asset::ModelCache;
use crate::scene::StencilState;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4, Vec3, Vec4};

/// Most flashlights one batched submission will carry. Affectors beyond the
/// cap are dropped for the frame.
pub const MAX_FLASHLIGHTS_PER_SUBMISSION: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelInstanceHandle(pub u32);

impl ModelInstanceHandle {
    pub const INVALID: Self = Self(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecalHandle(pub u32);

impl DecalHandle {
    pub const INVALID: Self = Self(u32::MAX);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMeshHandle(pub u32);

/// Handle to a locked baked-lighting cache entry; must be released after
/// the frame's submissions have been issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheHandle(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct LightingQuery {
    pub origin: Vec3,
    pub instance: ModelInstanceHandle,
    pub ambient_boost: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StaticLightingQuery {
    pub origin: Vec3,
    pub instance: ModelInstanceHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingState {
    pub ambient_cube: [Vec3; 6],
    pub local_light_count: u32,
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            ambient_cube: [Vec3::ZERO; 6],
            local_light_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlashlightState {
    pub world_to_texture: Mat4,
    pub color: Vec4,
}

#[derive(Debug, Default)]
pub struct LightingResults {
    pub states: Vec<LightingState>,
    pub env_cubemaps: Vec<Option<TextureHandle>>,
}

#[derive(Debug, Default)]
pub struct StaticLightingResults {
    pub states: Vec<LightingState>,
    pub decal_states: Vec<LightingState>,
    pub color_meshes: Vec<Option<ColorMeshHandle>>,
    pub env_cubemaps: Vec<Option<TextureHandle>>,
    pub cache_handles: Vec<CacheHandle>,
}

#[derive(Debug, Default)]
pub struct FlashlightInfo {
    /// Per queried instance, a bitmask over `flashlights`.
    pub usage: Vec<u32>,
    pub flashlights: Vec<FlashlightState>,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DrawFlags: u32 {
        const OPAQUE_ONLY          = 1 << 0;
        const SHADOW_DEPTH         = 1 << 1;
        const INCLUDE_TRANSLUCENT  = 1 << 2;
    }
}

/// Sentinel for "no entry" in the packed per-instance indices.
pub const INVALID_INDEX: u32 = u32::MAX;

/// Instance draw flag: bones were merged from an attachment parent.
pub const INSTANCE_BONE_MERGED: u32 = 1 << 0;

/// Per-instance payload of a batched submission. Plain data with a fixed
/// stride so a deferring backend can copy it wholesale onto its call queue.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceDrawData {
    pub diffuse_modulation: [f32; 4],
    /// First matrix of this instance's world bone transforms in
    /// [`ArraySubmission::pose_matrices`].
    pub pose_to_world_first: u32,
    pub bone_count: u32,
    pub skin: i32,
    pub body: i32,
    pub lod: u32,
    /// Position of the instance in the caller's original list.
    pub initial_list_index: u32,
    pub lighting_state: u32,
    pub decal_lighting_state: u32,
    pub env_cubemap: u32,
    pub color_mesh: u32,
    pub decal: u32,
    pub flashlight_usage: u32,
    pub stencil: u32,
    pub flags: u32,
}

/// One group's slice of the packed instance array.
#[derive(Debug, Clone, Copy)]
pub struct GroupDraw {
    pub model: crate::asset::Handle<crate::asset::ModelAsset>,
    pub first_instance: u32,
    pub instance_count: u32,
    /// How many entries of [`ArraySubmission::flashlights`] apply to this
    /// group's instances.
    pub flashlight_count: u32,
    pub wants_stencil: bool,
}

/// A complete batched submission. Everything referenced by index lives in
/// the borrowed tables below; a backend that defers execution must copy the
/// tables by value, since the scheduler's scratch is reset before the next
/// frame.
pub struct ArraySubmission<'a> {
    pub flags: DrawFlags,
    pub models: &'a ModelCache,
    pub groups: &'a [GroupDraw],
    pub instances: &'a [InstanceDrawData],
    pub instance_stride: usize,
    pub pose_matrices: &'a [Affine3A],
    pub lighting_states: &'a [LightingState],
    pub stencil_states: &'a [StencilState],
    pub flashlights: &'a [FlashlightState],
}

/// The rasterization backend and its batched bulk queries. All calls are
/// synchronous from the scheduler's point of view; deferral behind a call
/// queue is the backend's own business.
pub trait RenderBackend {
    fn compute_lighting(&mut self, queries: &[LightingQuery]) -> LightingResults;

    fn compute_static_lighting(&mut self, queries: &[StaticLightingQuery])
        -> StaticLightingResults;

    fn decal_handles(&mut self, instances: &[ModelInstanceHandle]) -> Vec<DecalHandle>;

    fn flashlight_info(
        &mut self,
        instances: &[ModelInstanceHandle],
        max_flashlights: usize,
    ) -> FlashlightInfo;

    fn forced_material_override(&mut self, material: Option<MaterialHandle>);

    /// Barrier between the non-stencil and stencil halves of a standard
    /// submission on platforms that forbid stencil writes during the depth
    /// prepass.
    fn end_depth_prepass(&mut self);

    fn draw_model_array(&mut self, submission: &ArraySubmission<'_>);

    fn draw_shadow_array(&mut self, submission: &ArraySubmission<'_>);

    fn release_static_lighting(&mut self, handles: &[CacheHandle]);
}

/// Projects a world-space sphere to an on-screen size, render-mode
/// independent.
pub trait ScreenProjection: Send + Sync {
    fn projected_size(&self, origin: Vec3, radius: f32) -> f32;
}

/// Standard projector over a view-projection matrix. Only the y and w rows
/// matter for a vertical screen extent.
#[derive(Debug, Clone, Copy)]
pub struct ViewProjector {
    pub view_proj: Mat4,
    pub view_up: Vec3,
    pub viewport_height: f32,
}

impl ScreenProjection for ViewProjector {
    fn projected_size(&self, origin: Vec3, radius: f32) -> f32 {
        let row_y = self.view_proj.row(1);
        let row_w = self.view_proj.row(3);

        let center = origin.extend(1.0);
        let offset = (self.view_up * radius).extend(0.0);

        let o_dot_y = row_y.dot(center);
        let v_dot_y = row_y.dot(offset);
        let o_dot_w = row_w.dot(center);
        let v_dot_w = row_w.dot(offset);

        let project = |y: f32, w: f32| {
            if w >= 0.001 {
                y / w
            } else {
                y * 1000.0
            }
        };
        let y0 = project(o_dot_y + v_dot_y, o_dot_w + v_dot_w);
        let y1 = project(o_dot_y - v_dot_y, o_dot_w - v_dot_w);

        // Halved because y spans [-1, 1] in projection space.
        self.viewport_height * (y1 - y0).abs() * 0.5
    }
}
