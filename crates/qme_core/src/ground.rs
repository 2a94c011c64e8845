/// Terrain kind under a point of the map.
///
/// Kinds are queried through methods rather than stored as flags so the
/// terrain semantics live in one place. Entities decide on their own
/// whether a kind obstructs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ground {
    /// No ground at all; behaves as traversable.
    Empty,
    #[default]
    Traversable,
    Wall,
    LowWall,
    DeepWater,
    ShallowWater,
    Grass,
    Hole,
    Ice,
    Ladder,
    Prickles,
    Lava,
}

impl Ground {
    pub const ALL: &'static [Ground] = &[
        Ground::Empty,
        Ground::Traversable,
        Ground::Wall,
        Ground::LowWall,
        Ground::DeepWater,
        Ground::ShallowWater,
        Ground::Grass,
        Ground::Hole,
        Ground::Ice,
        Ground::Ladder,
        Ground::Prickles,
        Ground::Lava,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Traversable => "traversable",
            Self::Wall => "wall",
            Self::LowWall => "low_wall",
            Self::DeepWater => "deep_water",
            Self::ShallowWater => "shallow_water",
            Self::Grass => "grass",
            Self::Hole => "hole",
            Self::Ice => "ice",
            Self::Ladder => "ladder",
            Self::Prickles => "prickles",
            Self::Lava => "lava",
        }
    }

    pub fn is_wall(self) -> bool {
        matches!(self, Self::Wall | Self::LowWall)
    }

    /// Terrain that swallows whatever ends up on it.
    pub fn is_hazard(self) -> bool {
        matches!(self, Self::Hole | Self::DeepWater | Self::Lava)
    }
}

impl std::fmt::Display for Ground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
