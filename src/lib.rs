//! Fast-path batched model rendering scheduler.
//!
//! Takes a flat per-frame list of drawable instances, buckets them by shared
//! model resource, orders the buckets so bone-setup dependencies resolve
//! parents first, and emits a small number of batched draw submissions to a
//! pluggable backend.

pub mod asset;
pub mod error;
pub mod scene;
pub mod scheduler;
pub mod settings;

pub use asset::{Handle, ModelAsset, ModelCache};
pub use error::ScheduleError;
pub use scene::{Drawable, LightingModel, ModelRenderable, RenderInstance};
pub use scheduler::{FrameSummary, ModelRenderScheduler, RenderMode};
pub use settings::ScheduleSettings;
