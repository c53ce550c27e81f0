use log::{debug, warn};
use slime_common::{SpeciesParams, MAX_SPECIES};
use std::f32::consts::{PI, TAU};

/// Largest turn rate magnitude, in radians per second.
pub const MAX_TURN_RATE: f32 = TAU;
/// Largest angle between the straight and side sensors.
pub const MAX_SENSOR_SPACING: f32 = PI;
/// Largest move speed, in pixels per second (half the widest field per second).
pub const MAX_MOVE_SPEED: f32 = 2048.0;
/// Largest sensor distance, in pixels.
pub const MAX_SENSOR_DISTANCE: f32 = 256.0;

/// Clamps `value` into `[min, max]`, logging when it had to move.
/// Non-finite input yields `None` so the caller keeps its previous value.
pub(crate) fn clamp_setting(name: &str, value: f32, min: f32, max: f32) -> Option<f32> {
    if !value.is_finite() {
        warn!("Ignoring non-finite {} ({}).", name, value);
        return None;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        debug!("{} {} clamped to {}.", name, value, clamped);
    }
    Some(clamped)
}

/// The four species slots and how many of them are simulated.
#[derive(Debug, Clone)]
pub struct SpeciesTable {
    slots: [SpeciesParams; MAX_SPECIES],
    active: u32,
}

impl SpeciesTable {
    pub fn new(slots: [SpeciesParams; MAX_SPECIES], active: u32) -> Self {
        let mut table = Self { slots, active: 1 };
        table.set_active(active);
        for index in 0..MAX_SPECIES {
            let SpeciesParams { color, move_speed, turn_rate, sensor_spacing, sensor_distance } =
                table.slots[index];
            table.set_color(index, color);
            table.set_move_speed(index, move_speed);
            table.set_turn_rate(index, turn_rate);
            table.set_sensor_spacing(index, sensor_spacing);
            table.set_sensor_distance(index, sensor_distance);
        }
        table
    }

    pub fn active(&self) -> u32 {
        self.active
    }

    /// Sets the simulated species count, clamped to `1..=4`. Returns whether it changed.
    pub fn set_active(&mut self, count: u32) -> bool {
        let clamped = count.clamp(1, MAX_SPECIES as u32);
        if clamped != count {
            debug!("species count {} clamped to {}.", count, clamped);
        }
        let changed = clamped != self.active;
        self.active = clamped;
        changed
    }

    pub fn slots(&self) -> &[SpeciesParams; MAX_SPECIES] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&SpeciesParams> {
        self.slots.get(index)
    }

    pub fn set_color(&mut self, index: usize, color: [f32; 3]) {
        if let Some(slot) = self.slots.get_mut(index) {
            for (c, value) in color.into_iter().enumerate() {
                if let Some(v) = clamp_setting("color channel", value, 0.0, 1.0) {
                    slot.color[c] = v;
                }
            }
        }
    }

    pub fn set_move_speed(&mut self, index: usize, move_speed: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            if let Some(v) = clamp_setting("move speed", move_speed, 0.0, MAX_MOVE_SPEED) {
                slot.move_speed = v;
            }
        }
    }

    pub fn set_turn_rate(&mut self, index: usize, turn_rate: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            if let Some(v) = clamp_setting("turn rate", turn_rate, -MAX_TURN_RATE, MAX_TURN_RATE) {
                slot.turn_rate = v;
            }
        }
    }

    pub fn set_sensor_spacing(&mut self, index: usize, sensor_spacing: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            if let Some(v) = clamp_setting("sensor spacing", sensor_spacing, 0.0, MAX_SENSOR_SPACING) {
                slot.sensor_spacing = v;
            }
        }
    }

    pub fn set_sensor_distance(&mut self, index: usize, sensor_distance: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            if let Some(v) = clamp_setting("sensor distance", sensor_distance, 0.0, MAX_SENSOR_DISTANCE) {
                slot.sensor_distance = v;
            }
        }
    }

    /// Restores the identity colors (red, green, blue, black).
    pub fn reset_colors(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.color = SpeciesParams::default_for_index(index).color;
        }
    }
}

impl Default for SpeciesTable {
    fn default() -> Self {
        Self::new(std::array::from_fn(SpeciesParams::default_for_index), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_are_clamped_not_rejected() {
        let mut table = SpeciesTable::default();
        table.set_move_speed(0, -5.0);
        table.set_turn_rate(0, 100.0);
        table.set_sensor_spacing(0, -1.0);
        table.set_sensor_distance(0, -2.0);
        table.set_color(0, [2.0, -1.0, 0.5]);

        let s = table.get(0).unwrap();
        assert_eq!(s.move_speed, 0.0);
        assert_eq!(s.turn_rate, MAX_TURN_RATE);
        assert_eq!(s.sensor_spacing, 0.0);
        assert_eq!(s.sensor_distance, 0.0);
        assert_eq!(s.color, [1.0, 0.0, 0.5]);
    }

    #[test]
    fn huge_distances_and_speeds_are_capped() {
        let mut table = SpeciesTable::default();
        table.set_sensor_distance(0, 1e20);
        table.set_move_speed(0, f32::MAX);
        let s = table.get(0).unwrap();
        assert_eq!(s.sensor_distance, MAX_SENSOR_DISTANCE);
        assert_eq!(s.move_speed, MAX_MOVE_SPEED);
    }

    #[test]
    fn non_finite_edits_keep_previous_value() {
        let mut table = SpeciesTable::default();
        table.set_move_speed(1, 12.0);
        table.set_move_speed(1, f32::NAN);
        assert_eq!(table.get(1).unwrap().move_speed, 12.0);
    }

    #[test]
    fn active_count_is_clamped_and_reports_change() {
        let mut table = SpeciesTable::default();
        assert!(!table.set_active(0)); // clamps to 1, unchanged
        assert!(table.set_active(9));
        assert_eq!(table.active(), 4);
        assert!(!table.set_active(4));
    }

    #[test]
    fn out_of_range_slot_is_ignored() {
        let mut table = SpeciesTable::default();
        table.set_move_speed(MAX_SPECIES, 1.0);
        assert!(table.get(MAX_SPECIES).is_none());
    }

    #[test]
    fn reset_colors_restores_identity() {
        let mut table = SpeciesTable::default();
        table.set_color(2, [0.3, 0.3, 0.3]);
        table.reset_colors();
        assert_eq!(table.get(2).unwrap().color, [0.0, 0.0, 1.0]);
    }
}
