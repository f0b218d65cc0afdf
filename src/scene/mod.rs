pub mod drawable;
pub mod instance;

pub use drawable::{
    BoneMask, Drawable, LightingModel, ModelRenderable, StencilCompare, StencilOp, StencilState,
};
pub use instance::RenderInstance;
