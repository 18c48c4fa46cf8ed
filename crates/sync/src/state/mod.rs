mod entity;
mod value;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub use entity::{EntityDelta, EntityState, RESERVED_FIELDS};
pub use value::FieldValue;

/// Authoritative entities of one category, keyed by id.
pub type StateMap = HashMap<String, EntityState>;

/// Reconstructed records of one category. Records may be sparse: a field the
/// client has never received stays absent.
pub type RecordMap = HashMap<String, EntityDelta>;

/// Per-tick change set for one category. `None` is the removal sentinel.
pub type CollectionDelta = HashMap<String, Option<EntityDelta>>;

/// Flat auxiliary values (score, flags). Keys are overwritten, never removed.
pub type Meta = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Players,
    Enemies,
    Projectiles,
    Walls,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Players,
        Category::Enemies,
        Category::Projectiles,
        Category::Walls,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Players => "players",
            Self::Enemies => "enemies",
            Self::Projectiles => "projectiles",
            Self::Walls => "walls",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
