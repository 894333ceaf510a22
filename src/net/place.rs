// Petri net places - identity of a token-holding location

use serde::{Deserialize, Serialize};

/// Stable integer identity of a place. Two places are equal iff their ids
/// match; the label and color tag are descriptive only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceId(pub u64);

impl From<u64> for PlaceId {
    fn from(id: u64) -> Self {
        PlaceId(id)
    }
}

impl std::fmt::Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A location where tokens reside. `color` names the token type this place
/// accepts; the engine never enforces it, it's descriptive metadata for
/// transition authors and tooling (§3: "a color type tag").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub label: String,
    pub color: String,
}

impl Place {
    pub fn new<L: Into<String>, C: Into<String>>(id: u64, label: L, color: C) -> Self {
        Place {
            id: PlaceId(id),
            label: label.into(),
            color: color.into(),
        }
    }
}

impl PartialEq for Place {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Place {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn places_equal_iff_ids_match() {
        let a = Place::new(1, "draft", "document");
        let b = Place::new(1, "different label", "different color");
        let c = Place::new(2, "draft", "document");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
