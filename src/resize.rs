use crate::field::FieldSet;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeState {
    Stable,
    /// New dimensions were seen and the fields are being rebuilt for them.
    Resizing { width: u32, height: u32 },
}

/// Watches the viewport and rebuilds the fields when its size changes.
#[derive(Debug, Clone)]
pub struct ResizeController {
    width: u32,
    height: u32,
    state: ResizeState,
}

impl ResizeController {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, state: ResizeState::Stable }
    }

    /// Dimensions the fields currently have.
    pub fn applied_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn state(&self) -> ResizeState {
        self.state
    }

    /// Compares the sampled viewport with the applied one and enters `Resizing` on a
    /// difference. Zero-sized viewports (e.g. a minimized window) are ignored.
    pub fn check(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            debug!("Ignoring {}x{} viewport.", width, height);
            return false;
        }
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.state = ResizeState::Resizing { width, height };
        true
    }

    /// Rebuilds `fields` for the pending dimensions. The new fields are allocated
    /// before the old ones are released, so a failure leaves `fields` and the applied
    /// dimensions untouched and the resize is attempted again on the next check.
    ///
    /// Returns whether the fields were replaced. Always leaves the controller `Stable`.
    pub fn apply(&mut self, fields: &mut FieldSet, max_pixels: u64) -> bool {
        let ResizeState::Resizing { width, height } = self.state else {
            return false;
        };
        self.state = ResizeState::Stable;

        match FieldSet::try_new(width, height, max_pixels) {
            Ok(new_fields) => {
                *fields = new_fields;
                info!(
                    "Resized fields from {}x{} to {}x{}.",
                    self.width, self.height, width, height
                );
                self.width = width;
                self.height = height;
                true
            }
            Err(e) => {
                warn!(
                    "Could not resize fields to {}x{} ({}); keeping {}x{}.",
                    width, height, e, self.width, self.height
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_or_zero_dimensions_stay_stable() {
        let mut controller = ResizeController::new(64, 64);
        assert!(!controller.check(64, 64));
        assert!(!controller.check(0, 48));
        assert_eq!(controller.state(), ResizeState::Stable);
    }

    #[test]
    fn resize_replaces_fields_and_returns_to_stable() {
        let mut fields = FieldSet::try_new(64, 64, 1 << 20).unwrap();
        let mut controller = ResizeController::new(64, 64);

        assert!(controller.check(32, 16));
        assert_eq!(controller.state(), ResizeState::Resizing { width: 32, height: 16 });
        assert!(controller.apply(&mut fields, 1 << 20));
        assert_eq!(controller.state(), ResizeState::Stable);
        assert_eq!(controller.applied_dimensions(), (32, 16));
        assert_eq!((fields.width(), fields.height()), (32, 16));
        assert_eq!(fields.colored.pixels().len(), 32 * 16);
    }

    #[test]
    fn failed_allocation_keeps_previous_fields() {
        let mut fields = FieldSet::try_new(8, 8, 100).unwrap();
        let mut controller = ResizeController::new(8, 8);

        assert!(controller.check(20, 20));
        assert!(!controller.apply(&mut fields, 100));
        assert_eq!(controller.state(), ResizeState::Stable);
        assert_eq!(controller.applied_dimensions(), (8, 8));
        assert_eq!((fields.width(), fields.height()), (8, 8));

        // Still different, so the next check tries again.
        assert!(controller.check(20, 20));
    }
}
