use super::model::{HardwareData, ModelAsset};
use super::Handle;
use crate::error::ScheduleError;

pub struct AssetCache<T> {
    items: Vec<T>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let index = self.items.len();
        self.items.push(item);
        Handle::new(index)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index())
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        (0..self.items.len()).map(Handle::new)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Model resources live in a plain cache; the scheduler only ever reads it.
pub type ModelCache = AssetCache<ModelAsset>;

impl AssetCache<ModelAsset> {
    /// Hardware data lookup. Fails when the asset never finished loading or
    /// its handle is stale; callers treat that as fail-soft, never fatal.
    pub fn hardware(&self, handle: Handle<ModelAsset>) -> Result<&HardwareData, ScheduleError> {
        let asset = self.get(handle).ok_or_else(|| ScheduleError::ResourceUnavailable {
            model: format!("<stale:{}>", handle.index()),
        })?;
        asset
            .hardware
            .as_ref()
            .ok_or_else(|| ScheduleError::ResourceUnavailable {
                model: asset.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::model::{ModelAsset, ModelFlags, Skeleton};

    #[test]
    fn hardware_lookup_fails_softly() {
        let mut cache = ModelCache::new();
        let broken = cache.insert(ModelAsset::new(
            "props/broken",
            ModelFlags::empty(),
            Skeleton::single_bone(),
        ));
        assert!(cache.hardware(broken).is_err());
        assert!(cache.hardware(Handle::new(99)).is_err());
    }
}
