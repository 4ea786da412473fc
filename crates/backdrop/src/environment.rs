use std::cell::Cell;
use std::rc::Rc;

use crate::types::LogicalSize;

/// Read-only view of the host signals the renderer reacts to.
pub trait Environment {
    fn is_visible(&self) -> bool;
    fn prefers_reduced_motion(&self) -> bool;
    fn device_pixel_ratio(&self) -> f64;
    fn viewport_size(&self) -> LogicalSize;
}

impl<E: Environment + ?Sized> Environment for Rc<E> {
    fn is_visible(&self) -> bool {
        (**self).is_visible()
    }

    fn prefers_reduced_motion(&self) -> bool {
        (**self).prefers_reduced_motion()
    }

    fn device_pixel_ratio(&self) -> f64 {
        (**self).device_pixel_ratio()
    }

    fn viewport_size(&self) -> LogicalSize {
        (**self).viewport_size()
    }
}

/// Settable environment for headless hosts and tests.
///
/// Values live in `Cell`s so a shared `Rc<StaticEnvironment>` can be flipped
/// while the renderer holds another handle to it.
#[derive(Debug)]
pub struct StaticEnvironment {
    visible: Cell<bool>,
    reduced_motion: Cell<bool>,
    device_pixel_ratio: Cell<f64>,
    viewport: Cell<LogicalSize>,
}

impl StaticEnvironment {
    pub fn new(viewport: LogicalSize, device_pixel_ratio: f64) -> Self {
        Self {
            visible: Cell::new(true),
            reduced_motion: Cell::new(false),
            device_pixel_ratio: Cell::new(device_pixel_ratio),
            viewport: Cell::new(viewport),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        self.reduced_motion.set(reduced);
    }

    pub fn set_device_pixel_ratio(&self, ratio: f64) {
        self.device_pixel_ratio.set(ratio);
    }

    pub fn set_viewport(&self, viewport: LogicalSize) {
        self.viewport.set(viewport);
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self::new(LogicalSize::new(1280.0, 720.0), 1.0)
    }
}

impl Environment for StaticEnvironment {
    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion.get()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio.get()
    }

    fn viewport_size(&self) -> LogicalSize {
        self.viewport.get()
    }
}
