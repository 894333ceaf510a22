// Marking algebra - the token game's container operations

//! # Marking Algebra
//!
//! A marking assigns each place a collection of resident tokens. The spec
//! (§4.A) gives four operations — `empty`, `multiplicity`, `consume`,
//! `produce` — plus an `is_sub` predicate, and a handful of algebraic laws
//! those operations must satisfy. Rather than one concrete marking type,
//! we re-architect this as a [`MarkingLike`] trait (§9 design note: "the
//! source has a type-class `MarkingLike`"), with two implementations:
//!
//! - [`ColoredMarking`]: the primary implementation, a place -> token-list
//!   map. This is what instances actually run on.
//! - [`UncoloredMarking`]: a place -> count map, useful wherever only the
//!   multiplicity projection matters (the scheduler's enablement check
//!   doesn't need colors at all).
//!
//! Every empty place is an absent key, never a key mapped to an empty
//! sequence — both implementations uphold that invariant by removing keys
//! whose value becomes empty.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::net::PlaceId;
use crate::token::Token;

/// Shared algebra over markings, parameterized over what a "sub-marking"
/// update looks like for a given implementation.
pub trait MarkingLike: Clone + std::fmt::Debug + Default {
    /// No tokens anywhere.
    fn empty() -> Self {
        Self::default()
    }

    /// Count of tokens per place.
    fn multiplicity(&self) -> HashMap<PlaceId, u64>;

    /// `true` if every place listed in `sub` has at least the requested
    /// tokens/count present in `self`.
    fn is_sub(&self, sub: &Self) -> bool;

    /// Remove the tokens/counts listed in `sub` from `self`. Precondition:
    /// `is_sub(sub, self)`; implementations may panic or no-op on
    /// violation since callers (the instance state machine) always check
    /// first — the token game never calls this speculatively.
    fn consume(&self, sub: &Self) -> Self;

    /// Add the tokens/counts listed in `add` into `self`.
    fn produce(&self, add: &Self) -> Self;
}

/// `{place -> token sequence}`. Order within a place is the order tokens
/// were produced; the token game (§4.C) selects the first `weight` tokens
/// in this order, so insertion order is load-bearing for determinism, even
/// though the spec calls it "immaterial to enablement".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColoredMarking(HashMap<PlaceId, Vec<Token>>);

impl ColoredMarking {
    pub fn from_map(map: HashMap<PlaceId, Vec<Token>>) -> Self {
        let mut cleaned = map;
        cleaned.retain(|_, tokens| !tokens.is_empty());
        ColoredMarking(cleaned)
    }

    pub fn single(place: PlaceId, tokens: Vec<Token>) -> Self {
        Self::from_map(HashMap::from([(place, tokens)]))
    }

    pub fn tokens_at(&self, place: PlaceId) -> &[Token] {
        self.0.get(&place).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn places(&self) -> impl Iterator<Item = &PlaceId> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &HashMap<PlaceId, Vec<Token>> {
        &self.0
    }
}

impl MarkingLike for ColoredMarking {
    fn multiplicity(&self) -> HashMap<PlaceId, u64> {
        self.0.iter().map(|(p, toks)| (*p, toks.len() as u64)).collect()
    }

    fn is_sub(&self, sub: &Self) -> bool {
        sub.0.iter().all(|(place, wanted)| {
            let have = self.0.get(place).cloned().unwrap_or_default();
            let mut have = have;
            for tok in wanted {
                match have.iter().position(|t| t == tok) {
                    Some(idx) => {
                        have.remove(idx);
                    }
                    None => return false,
                }
            }
            true
        })
    }

    fn consume(&self, sub: &Self) -> Self {
        let mut result = self.0.clone();
        for (place, wanted) in &sub.0 {
            let entry = result.entry(*place).or_default();
            for tok in wanted {
                if let Some(idx) = entry.iter().position(|t| t == tok) {
                    entry.remove(idx);
                }
            }
        }
        ColoredMarking::from_map(result)
    }

    fn produce(&self, add: &Self) -> Self {
        let mut result = self.0.clone();
        for (place, tokens) in &add.0 {
            result.entry(*place).or_default().extend(tokens.iter().cloned());
        }
        ColoredMarking::from_map(result)
    }
}

/// `{place -> count}`. Drops the token values entirely — only useful where
/// enablement, not token identity, is all that's needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncoloredMarking(HashMap<PlaceId, u64>);

impl UncoloredMarking {
    pub fn from_map(map: HashMap<PlaceId, u64>) -> Self {
        let mut cleaned = map;
        cleaned.retain(|_, count| *count > 0);
        UncoloredMarking(cleaned)
    }

    pub fn count_at(&self, place: PlaceId) -> u64 {
        self.0.get(&place).copied().unwrap_or(0)
    }
}

impl From<&ColoredMarking> for UncoloredMarking {
    fn from(m: &ColoredMarking) -> Self {
        UncoloredMarking::from_map(m.multiplicity())
    }
}

impl MarkingLike for UncoloredMarking {
    fn multiplicity(&self) -> HashMap<PlaceId, u64> {
        self.0.clone()
    }

    fn is_sub(&self, sub: &Self) -> bool {
        sub.0
            .iter()
            .all(|(place, count)| self.0.get(place).copied().unwrap_or(0) >= *count)
    }

    fn consume(&self, sub: &Self) -> Self {
        let mut result = self.0.clone();
        for (place, count) in &sub.0 {
            let entry = result.entry(*place).or_insert(0);
            *entry = entry.saturating_sub(*count);
        }
        UncoloredMarking::from_map(result)
    }

    fn produce(&self, add: &Self) -> Self {
        let mut result = self.0.clone();
        for (place, count) in &add.0 {
            *result.entry(*place).or_insert(0) += count;
        }
        UncoloredMarking::from_map(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tok(n: i64) -> Token {
        Token::new(json!(n))
    }

    #[test]
    fn empty_places_are_absent_keys() {
        let m = ColoredMarking::single(PlaceId(1), vec![tok(1)]);
        let consumed = m.consume(&ColoredMarking::single(PlaceId(1), vec![tok(1)]));
        assert!(consumed.as_map().get(&PlaceId(1)).is_none());
    }

    #[test]
    fn consume_produce_is_identity_when_disjoint() {
        let m = ColoredMarking::single(PlaceId(1), vec![tok(1)]);
        let x = ColoredMarking::single(PlaceId(2), vec![tok(2)]);
        let roundtrip = m.produce(&x).consume(&x);
        assert_eq!(roundtrip, m);
    }

    #[test]
    fn produce_consume_is_identity_when_sub() {
        let m = ColoredMarking::single(PlaceId(1), vec![tok(1), tok(2)]);
        let x = ColoredMarking::single(PlaceId(1), vec![tok(1)]);
        assert!(m.is_sub(&x));
        let roundtrip = m.consume(&x).produce(&x);
        assert_eq!(roundtrip.multiplicity(), m.multiplicity());
    }

    #[test]
    fn is_sub_respects_multiplicity() {
        let m = ColoredMarking::single(PlaceId(1), vec![tok(1)]);
        let want_two = ColoredMarking::single(PlaceId(1), vec![tok(1), tok(1)]);
        assert!(!m.is_sub(&want_two));
    }

    #[test]
    fn uncolored_marking_tracks_counts_only() {
        let m = UncoloredMarking::from_map(HashMap::from([(PlaceId(1), 3)]));
        let sub = UncoloredMarking::from_map(HashMap::from([(PlaceId(1), 2)]));
        assert!(m.is_sub(&sub));
        let consumed = m.consume(&sub);
        assert_eq!(consumed.count_at(PlaceId(1)), 1);
    }
}

// Property-based checks for the §4.A algebraic laws, across arbitrary
// token sequences rather than the handful of examples above.
#[cfg(test)]
mod laws {
    use super::*;
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;

    fn tokens() -> impl Strategy<Value = Vec<Token>> {
        pvec(any::<i64>().prop_map(|n| Token::new(serde_json::json!(n))), 0..6)
    }

    proptest! {
        // Disjoint supports (different places) make produce commutative and
        // consume-after-produce an identity, regardless of token contents.
        #[test]
        fn consume_produce_identity_on_disjoint_supports(base in tokens(), extra in tokens()) {
            let m = ColoredMarking::single(PlaceId(1), base);
            let x = ColoredMarking::single(PlaceId(2), extra);
            prop_assert_eq!(m.produce(&x).consume(&x), m.clone());
            prop_assert_eq!(m.produce(&x), x.produce(&m));
        }

        // Consuming a prefix and producing it back restores the original
        // multiplicity (token identity may reorder the tail within a place,
        // but counts must round-trip exactly).
        #[test]
        fn produce_consume_identity_on_sub(base in pvec(any::<i64>(), 1..8), take in 0usize..8) {
            let base: Vec<Token> = base.into_iter().map(|n| Token::new(serde_json::json!(n))).collect();
            let take = take.min(base.len());
            let m = ColoredMarking::single(PlaceId(1), base.clone());
            let sub = ColoredMarking::single(PlaceId(1), base[..take].to_vec());
            prop_assert!(m.is_sub(&sub));
            let roundtrip = m.consume(&sub).produce(&sub);
            prop_assert_eq!(roundtrip.multiplicity(), m.multiplicity());
        }

        // Every place that ends up with zero tokens after consume() is an
        // absent key, never a key mapped to an empty Vec.
        #[test]
        fn consume_to_empty_removes_the_key(base in tokens()) {
            let m = ColoredMarking::single(PlaceId(1), base.clone());
            let consumed = m.consume(&ColoredMarking::single(PlaceId(1), base));
            prop_assert!(consumed.as_map().get(&PlaceId(1)).is_none());
        }
    }
}
