//! Geometric primitives: points, axis-aligned rectangles, and the eight
//! block orientations.

use mosaic_common::EPSILON;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the floorplan plane.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned rectangle given by its lower-left corner and size.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Rect {
    /// Creates a rectangle from its lower-left corner and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge.
    pub fn x_max(&self) -> f64 {
        self.x + self.width
    }

    /// Top edge.
    pub fn y_max(&self) -> f64 {
        self.y + self.height
    }

    /// Area of the rectangle.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns `true` if the interiors of the two rectangles intersect.
    ///
    /// Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x + EPSILON < other.x_max()
            && other.x + EPSILON < self.x_max()
            && self.y + EPSILON < other.y_max()
            && other.y + EPSILON < self.y_max()
    }

    /// Returns `true` if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x + EPSILON >= self.x
            && other.y + EPSILON >= self.y
            && other.x_max() <= self.x_max() + EPSILON
            && other.y_max() <= self.y_max() + EPSILON
    }

    /// Returns a copy moved by `(dx, dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// One of the eight block orientations.
///
/// `N` is the block as defined. `E`, `S`, and `W` are clockwise rotations by
/// 90, 180, and 270 degrees; the `F*` variants mirror about the vertical axis
/// first. Orientations with an odd index swap width and height.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// As defined.
    #[default]
    N,
    /// Rotated 90 degrees clockwise.
    E,
    /// Rotated 180 degrees.
    S,
    /// Rotated 270 degrees clockwise.
    W,
    /// Mirrored.
    FN,
    /// Mirrored, then rotated 90 degrees clockwise.
    FE,
    /// Mirrored, then rotated 180 degrees.
    FS,
    /// Mirrored, then rotated 270 degrees clockwise.
    FW,
}

impl Orientation {
    /// All orientations in index order.
    pub const ALL: [Orientation; 8] = [
        Orientation::N,
        Orientation::E,
        Orientation::S,
        Orientation::W,
        Orientation::FN,
        Orientation::FE,
        Orientation::FS,
        Orientation::FW,
    ];

    /// Index in `0..8`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Orientation for an index, taken modulo 8.
    pub fn from_index(index: usize) -> Orientation {
        Self::ALL[index % 8]
    }

    /// Returns `true` if this orientation exchanges width and height.
    pub fn swaps_dimensions(self) -> bool {
        self.index() % 2 == 1
    }

    /// Maps a pin offset, normalized to the block dimensions and measured
    /// from the block center, into this orientation.
    pub fn map_offset(self, dx: f64, dy: f64) -> (f64, f64) {
        match self {
            Orientation::N => (dx, dy),
            Orientation::E => (dy, -dx),
            Orientation::S => (-dx, -dy),
            Orientation::W => (-dy, dx),
            Orientation::FN => (-dx, dy),
            Orientation::FE => (dy, dx),
            Orientation::FS => (dx, -dy),
            Orientation::FW => (-dy, -dx),
        }
    }

    /// The orientation obtained by a further quarter turn clockwise.
    pub fn rotated_quarter(self) -> Orientation {
        let i = self.index();
        Orientation::from_index((i & 4) | ((i + 1) & 3))
    }

    /// The orientation obtained by mirroring left-right.
    pub fn flip_x(self) -> Orientation {
        match self {
            Orientation::N => Orientation::FN,
            Orientation::E => Orientation::FW,
            Orientation::S => Orientation::FS,
            Orientation::W => Orientation::FE,
            Orientation::FN => Orientation::N,
            Orientation::FE => Orientation::W,
            Orientation::FS => Orientation::S,
            Orientation::FW => Orientation::E,
        }
    }

    /// The orientation obtained by mirroring top-bottom.
    pub fn flip_y(self) -> Orientation {
        match self {
            Orientation::N => Orientation::FS,
            Orientation::E => Orientation::FE,
            Orientation::S => Orientation::FN,
            Orientation::W => Orientation::FW,
            Orientation::FN => Orientation::S,
            Orientation::FE => Orientation::E,
            Orientation::FS => Orientation::N,
            Orientation::FW => Orientation::W,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Orientation::N => "N",
            Orientation::E => "E",
            Orientation::S => "S",
            Orientation::W => "W",
            Orientation::FN => "FN",
            Orientation::FE => "FE",
            Orientation::FS => "FS",
            Orientation::FW => "FW",
        };
        f.write_str(name)
    }
}

/// A compass direction in the floorplan plane.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Direction {
    /// Towards larger x.
    Right,
    /// Towards larger y.
    Up,
    /// Towards smaller x.
    Left,
    /// Towards smaller y.
    Down,
}

impl Direction {
    /// All directions, in legalizer tie-break order.
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Up,
        Direction::Left,
        Direction::Down,
    ];

    /// Unit displacement of this direction.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Down => (0.0, -1.0),
        }
    }

    /// Returns `true` for `Left` and `Right`.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Left => "left",
            Direction::Down => "down",
        };
        f.write_str(name)
    }
}
