//! Sparse merge: fields absent from an update keep their current value.

use crate::events::payload::*;

pub trait SparseMerge {
    /// Overwrite every field `update` carries; leave the rest untouched.
    fn merge_from(&mut self, update: &Self);
}

pub fn merge<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}

/// Merge a nested sub-object field by field instead of replacing it.
pub fn merge_nested<T: SparseMerge + Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    let Some(update) = incoming else {
        return;
    };
    if let Some(current) = slot.as_mut() {
        current.merge_from(update);
    } else {
        *slot = Some(update.clone());
    }
}

macro_rules! sparse_merge {
    ($ty:ident { $($field:ident),* $(,)? } $(nested { $($nested:ident),* $(,)? })?) => {
        impl SparseMerge for $ty {
            fn merge_from(&mut self, update: &Self) {
                $( merge(&mut self.$field, &update.$field); )*
                $($( merge_nested(&mut self.$nested, &update.$nested); )*)?
            }
        }
    };
}

sparse_merge!(BodyUpdate {
    id, name, temp, set_point, heat_setpoint, cool_setpoint, heat_mode, heat_status,
    is_on, is_covered, circuit, body_type,
});
sparse_merge!(CircuitUpdate { id, name, is_on, lighting_theme, circuit_type });
sparse_merge!(PumpUpdate {
    id, name, rpm, watts, flow, relay, command, status, min_speed, max_speed, min_flow,
    max_flow,
});
sparse_merge!(FilterUpdate { id, name, is_on, clean_percentage, pressure, pressure_units });
sparse_merge!(ChlorinatorUpdate {
    id, name, salt_level, salt_target, salt_required, current_output, target_output,
    pool_setpoint, spa_setpoint, super_chlor, super_chlor_hours, status, body,
});
sparse_merge!(Tank { capacity, level, units });
sparse_merge!(Probe { level, temperature, temp_units });
sparse_merge!(
    Chemical { level, setpoint, enabled, dosing_status, demand, daily_volume_dosed }
    nested { tank, probe }
);
sparse_merge!(
    ChemControllerUpdate { id, name, lsi, csi, calcium_hardness, cyanuric_acid, alkalinity, borates }
    nested { ph, orp }
);
sparse_merge!(ControllerUpdate { model, freeze, mode, app_version_state });
sparse_merge!(ScheduleUpdate { id, disabled, circuit });

impl SparseMerge for TempsUpdate {
    fn merge_from(&mut self, update: &Self) {
        merge(&mut self.units, &update.units);
        merge(&mut self.bodies, &update.bodies);
        for (key, value) in &update.readings {
            self.readings.insert(key.clone(), value.clone());
        }
    }
}
