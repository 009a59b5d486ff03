//! File-space to world-space axis conversion.
//!
//! MHCLO documents are authored with Y up. The consuming scene is Z up, so the
//! file's Y axis becomes world Z and the file's Z axis becomes negated world Y.
//! Offsets and scale anchors both go through the single table below.

use nalgebra::Vector3;

/// World component and sign for each file axis, indexed by [`Axis::index`].
const FILE_TO_WORLD: [(usize, f64); 3] = [(0, 1.0), (2, 1.0), (1, -1.0)];

/// A file-space axis, as named by the `x_scale`, `y_scale` and `z_scale` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// File X.
    X,
    /// File Y.
    Y,
    /// File Z.
    Z,
}

impl Axis {
    /// All axes in file order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in file order.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The world-space component this file axis lands on.
    #[inline]
    pub fn world_component(self) -> usize {
        FILE_TO_WORLD[self.index()].0
    }

    /// The document key that declares a scale anchor for this axis.
    pub fn scale_key(self) -> &'static str {
        match self {
            Axis::X => "x_scale",
            Axis::Y => "y_scale",
            Axis::Z => "z_scale",
        }
    }
}

/// Convert a file-space offset `(d0, d1, d2)` to world space `(d0, -d2, d1)`.
pub fn file_to_world(file: [f64; 3]) -> Vector3<f64> {
    let mut world = Vector3::zeros();
    for axis in Axis::ALL {
        let (component, sign) = FILE_TO_WORLD[axis.index()];
        world[component] = sign * file[axis.index()];
    }
    world
}

/// Arrange per-file-axis sizes by the world component they scale.
///
/// Sizes carry no sign, so `[x, y, z]` becomes `(x, z, y)`.
pub fn sizes_to_world(sizes: [f64; 3]) -> Vector3<f64> {
    let mut world = Vector3::zeros();
    for axis in Axis::ALL {
        world[axis.world_component()] = sizes[axis.index()];
    }
    world
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_swaps_and_negates() {
        let world = file_to_world([1.0, 2.0, 3.0]);
        assert_eq!(world, Vector3::new(1.0, -3.0, 2.0));
    }

    #[test]
    fn test_anchor_components_follow_offsets() {
        assert_eq!(Axis::X.world_component(), 0);
        assert_eq!(Axis::Y.world_component(), 2);
        assert_eq!(Axis::Z.world_component(), 1);
    }

    #[test]
    fn test_sizes_to_world() {
        let world = sizes_to_world([2.0, 3.0, 5.0]);
        assert_eq!(world, Vector3::new(2.0, 5.0, 3.0));
    }
}
