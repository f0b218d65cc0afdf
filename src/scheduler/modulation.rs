use super::records::InstanceRecord;
use crate::scene::RenderInstance;
use rayon::prelude::*;

/// Final per-instance tint: base diffuse modulation from the drawable's
/// ownership state, alpha from the instance request. Pure over resolved
/// state, so repeated runs produce bit-identical output.
pub(crate) fn modulate_colors(records: &mut [InstanceRecord], instances: &[RenderInstance]) {
    records.par_iter_mut().for_each(|record| {
        if record.setup_bones_only {
            return;
        }
        let instance = &instances[record.instance_index];
        let rgb = instance.drawable.color_modulation();
        record.diffuse_modulation = rgb.extend(f32::from(instance.alpha) * (1.0 / 255.0));
    });
}
