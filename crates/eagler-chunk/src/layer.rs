//! Render layers that section geometry is split into.

use std::fmt;

/// A rendering pass bucket for section geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RenderLayer {
    /// Fully opaque blocks, drawn front-to-back with depth writes.
    Opaque = 0,
    /// Alpha-blended blocks such as glass.
    Translucent = 1,
    /// Water surfaces, drawn after translucent geometry.
    WaterMask = 2,
}

impl RenderLayer {
    /// Number of layers.
    pub const COUNT: usize = 3;

    /// All layers in draw order.
    pub const ALL: [RenderLayer; Self::COUNT] = [Self::Opaque, Self::Translucent, Self::WaterMask];

    /// Index into per-layer arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether geometry in this layer must be depth-sorted against the camera.
    pub fn is_transparency_dependent(self) -> bool {
        matches!(self, Self::Translucent | Self::WaterMask)
    }

    /// Short lowercase name, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Translucent => "translucent",
            Self::WaterMask => "water_mask",
        }
    }
}

impl fmt::Display for RenderLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
