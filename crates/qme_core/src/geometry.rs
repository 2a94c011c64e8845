//! Integer map geometry.
//!
//! Map coordinates are whole pixels with y growing downward. Positions of
//! entities always refer to their origin point; bounding boxes are derived
//! from the origin offset and size.

use serde::Deserialize;

/// A pixel position on the map.
pub type Point = glam::IVec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Half-open overlap test: touching edges do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn translated(&self, delta: Point) -> Rect {
        Rect::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }
}

/// One of the four main directions, indexed counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction4 {
    Right,
    Up,
    Left,
    Down,
}

impl Direction4 {
    pub const ALL: [Direction4; 4] = [
        Direction4::Right,
        Direction4::Up,
        Direction4::Left,
        Direction4::Down,
    ];

    pub fn index(self) -> i32 {
        match self {
            Self::Right => 0,
            Self::Up => 1,
            Self::Left => 2,
            Self::Down => 3,
        }
    }

    pub fn from_index(index: i32) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Up => Self::Down,
            Self::Left => Self::Right,
            Self::Down => Self::Up,
        }
    }

    /// Unit step in map coordinates.
    pub fn offset(self) -> Point {
        match self {
            Self::Right => Point::new(1, 0),
            Self::Up => Point::new(0, -1),
            Self::Left => Point::new(-1, 0),
            Self::Down => Point::new(0, 1),
        }
    }

    /// Angle in radians, counter-clockwise from east.
    pub fn angle(self) -> f64 {
        f64::from(self.index()) * std::f64::consts::FRAC_PI_2
    }
}

/// One of the eight directions, indexed counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction8 {
    East,
    NorthEast,
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
}

impl Direction8 {
    pub const ALL: [Direction8; 8] = [
        Direction8::East,
        Direction8::NorthEast,
        Direction8::North,
        Direction8::NorthWest,
        Direction8::West,
        Direction8::SouthWest,
        Direction8::South,
        Direction8::SouthEast,
    ];

    pub fn index(self) -> i32 {
        match self {
            Self::East => 0,
            Self::NorthEast => 1,
            Self::North => 2,
            Self::NorthWest => 3,
            Self::West => 4,
            Self::SouthWest => 5,
            Self::South => 6,
            Self::SouthEast => 7,
        }
    }

    pub fn from_index(index: i32) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }

    pub fn from_direction4(direction: Direction4) -> Self {
        match direction {
            Direction4::Right => Self::East,
            Direction4::Up => Self::North,
            Direction4::Left => Self::West,
            Direction4::Down => Self::South,
        }
    }

    /// Unit step in map coordinates; diagonals move one pixel on both axes.
    pub fn offset(self) -> Point {
        match self {
            Self::East => Point::new(1, 0),
            Self::NorthEast => Point::new(1, -1),
            Self::North => Point::new(0, -1),
            Self::NorthWest => Point::new(-1, -1),
            Self::West => Point::new(-1, 0),
            Self::SouthWest => Point::new(-1, 1),
            Self::South => Point::new(0, 1),
            Self::SouthEast => Point::new(1, 1),
        }
    }
}

/// Discrete z-order of the map. Entities only interact on the same layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    #[default]
    Low,
    Intermediate,
    High,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Low, Layer::Intermediate, Layer::High];

    pub fn index(self) -> i32 {
        match self {
            Self::Low => 0,
            Self::Intermediate => 1,
            Self::High => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect::new(0, 0, 16, 16);
        let b = Rect::new(16, 0, 16, 16);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&b.translated(Point::new(-1, 0))));
    }

    #[test]
    fn contains_rect_accepts_equal_rect() {
        let a = Rect::new(8, 8, 16, 16);
        assert!(a.contains_rect(&a));
        assert!(!a.contains_rect(&a.translated(Point::new(1, 0))));
    }

    #[test]
    fn contains_point_is_half_open() {
        let a = Rect::new(0, 0, 16, 16);
        assert!(a.contains_point(Point::new(0, 0)));
        assert!(a.contains_point(Point::new(15, 15)));
        assert!(!a.contains_point(Point::new(16, 8)));
    }

    #[test]
    fn opposite_is_two_quarter_turns() {
        for direction in Direction4::ALL {
            let expected = (direction.index() + 2) % 4;
            assert_eq!(direction.opposite().index(), expected);
            assert_eq!(direction.offset() + direction.opposite().offset(), Point::ZERO);
        }
    }

    #[test]
    fn direction_indices_round_trip() {
        for direction in Direction8::ALL {
            assert_eq!(Direction8::from_index(direction.index()), Some(direction));
        }
        assert_eq!(Direction4::from_index(4), None);
        assert_eq!(Direction4::from_index(-1), None);
    }

    #[test]
    fn direction8_from_direction4_keeps_offset() {
        for direction in Direction4::ALL {
            assert_eq!(
                Direction8::from_direction4(direction).offset(),
                direction.offset()
            );
        }
    }

    #[test]
    fn layer_deserializes_from_lowercase() {
        let layer: Layer = serde_json::from_str("\"intermediate\"").expect("valid layer");
        assert_eq!(layer, Layer::Intermediate);
        assert_eq!(layer.index(), 1);
    }
}
