pub mod cache;
pub mod handle;
pub mod model;

pub use cache::{AssetCache, ModelCache};
pub use handle::Handle;
pub use model::{HardwareData, LodMetricTable, ModelAsset, ModelFlags, Skeleton};
