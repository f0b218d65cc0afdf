use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Runtime scheduler knobs, loadable from a JSON settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Force every instance to one LOD; -1 selects by projected size.
    #[serde(default = "ScheduleSettings::default_forced_lod")]
    pub forced_lod: i32,
    /// Drop every fast-path submission. Diagnostic switch.
    #[serde(default)]
    pub skip_fast_path: bool,
    /// Draw everything with the debug material to visualize coverage.
    #[serde(default)]
    pub colorize_fast_path: bool,
    /// The platform cannot write stencil during its depth prepass; stencil
    /// groups are pulled to the tail and submitted after a barrier.
    #[serde(default)]
    pub deferred_stencil: bool,
    /// Smooth morph weights with a delayed buffer.
    #[serde(default = "ScheduleSettings::default_flex_smooth")]
    pub flex_smooth: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            forced_lod: Self::default_forced_lod(),
            skip_fast_path: false,
            colorize_fast_path: false,
            deferred_stencil: false,
            flex_smooth: Self::default_flex_smooth(),
        }
    }
}

impl ScheduleSettings {
    fn default_forced_lod() -> i32 {
        -1
    }

    fn default_flex_smooth() -> bool {
        true
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<ScheduleSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded scheduler settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default scheduler settings.",
                        path, err
                    );
                    ScheduleSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {:?}, using defaults", path);
                ScheduleSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default scheduler settings.",
                    path, err
                );
                ScheduleSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if self.forced_lod < -1 {
            warn!("forced_lod {} below -1, treating as automatic", self.forced_lod);
            self.forced_lod = -1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: ScheduleSettings = serde_json::from_str("{\"forced_lod\": 2}").unwrap();
        assert_eq!(settings.forced_lod, 2);
        assert!(settings.flex_smooth);
        assert!(!settings.deferred_stencil);
    }

    #[test]
    fn settings_round_trip() {
        let mut settings = ScheduleSettings::default();
        settings.deferred_stencil = true;
        settings.forced_lod = 0;

        let json = serde_json::to_string(&settings).unwrap();
        let back: ScheduleSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.forced_lod, 0);
        assert!(back.deferred_stencil);
    }

    #[test]
    fn validate_clamps_forced_lod() {
        let settings: ScheduleSettings =
            serde_json::from_str("{\"forced_lod\": -5}").unwrap();
        assert_eq!(settings.validate().forced_lod, -1);
    }
}
