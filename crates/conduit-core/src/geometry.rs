//! World-space and block-space primitives.
//!
//! Movers travel through continuous world space ([`Vec3`]) while network
//! nodes live on the integer block grid ([`BlockPos`]). Blocks are centered on
//! integer coordinates, so a world position maps to the block whose center is
//! nearest on each axis.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A point in continuous world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Vec3) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear interpolation towards `other`. `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &Vec3, t: f64) -> Vec3 {
        Vec3 {
            x: self.x + t * (other.x - self.x),
            y: self.y + t * (other.y - self.y),
            z: self.z + t * (other.z - self.z),
        }
    }
}

impl From<BlockPos> for Vec3 {
    fn from(pos: BlockPos) -> Self {
        Vec3::new(pos.x as f64, pos.y as f64, pos.z as f64)
    }
}

/// A block location on the integer grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block containing a world-space point.
    pub fn containing(point: Vec3) -> Self {
        Self {
            x: point.x.round() as i32,
            y: point.y.round() as i32,
            z: point.z.round() as i32,
        }
    }

    /// The neighbouring block in the given direction.
    pub fn offset(&self, side: Side) -> BlockPos {
        let (dx, dy, dz) = side.delta();
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

/// One of the six faces of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Up,
    Down,
    North,
    East,
    South,
    West,
}

impl Side {
    /// All six sides, in bit order.
    pub const ALL: [Side; 6] = [
        Side::Up,
        Side::Down,
        Side::North,
        Side::East,
        Side::South,
        Side::West,
    ];

    /// The face pointing the other way.
    pub fn opposite(self) -> Side {
        match self {
            Side::Up => Side::Down,
            Side::Down => Side::Up,
            Side::North => Side::South,
            Side::South => Side::North,
            Side::East => Side::West,
            Side::West => Side::East,
        }
    }

    /// Grid offset towards the neighbour on this side. North is -z, east is +x.
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Side::Up => (0, 1, 0),
            Side::Down => (0, -1, 0),
            Side::North => (0, 0, -1),
            Side::East => (1, 0, 0),
            Side::South => (0, 0, 1),
            Side::West => (-1, 0, 0),
        }
    }

    /// Parse a lower-case side name as used in data files.
    pub fn from_name(name: &str) -> Option<Side> {
        match name {
            "up" | "top" => Some(Side::Up),
            "down" | "bottom" => Some(Side::Down),
            "north" | "front" => Some(Side::North),
            "east" | "right" => Some(Side::East),
            "south" | "back" => Some(Side::South),
            "west" | "left" => Some(Side::West),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// This side after rotating the block clockwise (seen from above).
    pub fn rotated(self, rotation: Rotation) -> Side {
        let steps = match rotation {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        };
        (0..steps).fold(self, |side, _| match side {
            Side::North => Side::East,
            Side::East => Side::South,
            Side::South => Side::West,
            Side::West => Side::North,
            vertical => vertical,
        })
    }
}

/// A set of sides, stored as a 6-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SideMask(u8);

impl SideMask {
    pub const NONE: SideMask = SideMask(0);
    pub const ALL: SideMask = SideMask(0b11_1111);

    /// Build a mask from raw bits. Bits above the sixth are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11_1111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn of(sides: &[Side]) -> Self {
        sides.iter().fold(Self::NONE, |mask, &side| mask.with(side))
    }

    pub fn with(self, side: Side) -> Self {
        Self(self.0 | side.bit())
    }

    pub fn contains(self, side: Side) -> bool {
        self.0 & side.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn sides(self) -> impl Iterator<Item = Side> {
        Side::ALL.into_iter().filter(move |&s| self.contains(s))
    }

    pub fn rotated(self, rotation: Rotation) -> Self {
        self.sides()
            .fold(Self::NONE, |mask, side| mask.with(side.rotated(rotation)))
    }
}

impl From<Side> for SideMask {
    fn from(side: Side) -> Self {
        Self(side.bit())
    }
}

/// Horizontal orientation of a placed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    /// 90 degrees clockwise.
    Cw90,
    /// 180 degrees.
    Cw180,
    /// 270 degrees clockwise (90 degrees counter-clockwise).
    Cw270,
}

/// Which half of a node's connectivity a lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}
