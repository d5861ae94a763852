//! Camera position providers.

use std::sync::{Arc, RwLock};

use glam::Vec3;

/// Supplies the current camera position, or `None` when there is no camera
/// entity (e.g. the player left the world).
pub trait CameraProvider {
    /// World-space camera position.
    fn camera_position(&self) -> Option<Vec3>;
}

impl CameraProvider for Option<Vec3> {
    fn camera_position(&self) -> Option<Vec3> {
        *self
    }
}

/// A cloneable camera handle that the host updates and the scheduler reads.
#[derive(Debug, Clone, Default)]
pub struct SharedCamera {
    position: Arc<RwLock<Option<Vec3>>>,
}

impl SharedCamera {
    /// Creates a handle with a camera at `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Arc::new(RwLock::new(Some(position))),
        }
    }

    /// Creates a handle with no camera.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Replaces the camera position (`None` removes the camera).
    pub fn set(&self, position: Option<Vec3>) {
        let mut guard = self.position.write().unwrap_or_else(|e| e.into_inner());
        *guard = position;
    }
}

impl CameraProvider for SharedCamera {
    fn camera_position(&self) -> Option<Vec3> {
        *self.position.read().unwrap_or_else(|e| e.into_inner())
    }
}
