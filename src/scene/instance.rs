use super::drawable::{Drawable, ModelRenderable};
use crate::asset::{Handle, ModelAsset};
use std::sync::Arc;

/// One entry of the flat per-frame instance list handed to the scheduler.
///
/// The list itself is the instance table: `attachment_parent` is a stable
/// index into the same slice, never a live pointer, so dependency depth can
/// be computed safely while the underlying drawables are mutated elsewhere.
pub struct RenderInstance {
    pub model: Handle<ModelAsset>,
    pub drawable: Arc<dyn Drawable>,
    /// Absent for bone-setup-only dependencies (e.g. an invisible bone
    /// scaffold a visible child hangs off).
    pub model_renderable: Option<Arc<dyn ModelRenderable>>,
    /// Requested opacity, combined into the diffuse modulation at draw time.
    pub alpha: u8,
    pub attachment_parent: Option<usize>,
}

impl RenderInstance {
    pub fn new(model: Handle<ModelAsset>, drawable: Arc<dyn Drawable>) -> Self {
        Self {
            model,
            drawable,
            model_renderable: None,
            alpha: 255,
            attachment_parent: None,
        }
    }

    pub fn with_renderable(mut self, renderable: Arc<dyn ModelRenderable>) -> Self {
        self.model_renderable = Some(renderable);
        self
    }

    pub fn with_alpha(mut self, alpha: u8) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn attached_to(mut self, parent: usize) -> Self {
        self.attachment_parent = Some(parent);
        self
    }
}
