// Immutable bipartite net topology: places, transitions, weighted arcs

use std::collections::HashMap;

use super::arc::{Arc as NetArc, Weight};
use super::place::{Place, PlaceId};
use super::transition::{Transition, TransitionId};
use crate::error::EngineError;
use crate::Result;

/// One edge of the adjacency table: which transition, at what weight,
/// through which field selector.
#[derive(Debug, Clone)]
pub struct AdjacentTransition {
    pub transition: TransitionId,
    pub weight: Weight,
    pub selector: String,
}

#[derive(Debug, Clone)]
pub struct AdjacentPlace {
    pub place: PlaceId,
    pub weight: Weight,
    pub selector: String,
}

/// An immutable Petri net: places, transitions, and the arcs connecting
/// them. Built once and shared (via `Arc<Net>`, the standard-library kind)
/// across every component that needs to query it.
///
/// Internally this is two parallel adjacency tables rather than a generic
/// bipartite graph library (§9 design note): `place_to_transitions` for
/// input arcs, `transition_to_places` for output arcs. Both are built once
/// in [`Net::new`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Net {
    places: HashMap<PlaceId, Place>,
    transitions: HashMap<TransitionId, Transition>,
    arcs: Vec<NetArc>,
    place_to_transitions: HashMap<PlaceId, Vec<AdjacentTransition>>,
    transition_to_places_out: HashMap<TransitionId, Vec<AdjacentPlace>>,
    transition_to_places_in: HashMap<TransitionId, Vec<AdjacentPlace>>,
}

impl Net {
    /// Construct a net, validating the invariants from §3: bipartite (no
    /// place-place or transition-transition arcs — structurally impossible
    /// given [`NetArc`]'s shape, so nothing to check there), every arc
    /// endpoint present in the node set, and weights positive (enforced by
    /// [`Weight::new`] at construction time, so only endpoint membership is
    /// checked here).
    pub fn new(places: Vec<Place>, transitions: Vec<Transition>, arcs: Vec<NetArc>) -> Result<Self> {
        let places: HashMap<PlaceId, Place> = places.into_iter().map(|p| (p.id, p)).collect();
        let transitions: HashMap<TransitionId, Transition> =
            transitions.into_iter().map(|t| (t.id, t)).collect();

        for arc in &arcs {
            if !places.contains_key(&arc.place()) {
                return Err(EngineError::UnknownNode(format!(
                    "arc references unknown place {}",
                    arc.place()
                )));
            }
            if !transitions.contains_key(&arc.transition()) {
                return Err(EngineError::UnknownNode(format!(
                    "arc references unknown transition {}",
                    arc.transition()
                )));
            }
        }

        let mut place_to_transitions: HashMap<PlaceId, Vec<AdjacentTransition>> = HashMap::new();
        let mut transition_to_places_out: HashMap<TransitionId, Vec<AdjacentPlace>> = HashMap::new();
        let mut transition_to_places_in: HashMap<TransitionId, Vec<AdjacentPlace>> = HashMap::new();

        for arc in &arcs {
            match arc {
                NetArc::PlaceToTransition {
                    place,
                    transition,
                    weight,
                    selector,
                } => {
                    place_to_transitions
                        .entry(*place)
                        .or_default()
                        .push(AdjacentTransition {
                            transition: *transition,
                            weight: *weight,
                            selector: selector.clone(),
                        });
                    transition_to_places_in
                        .entry(*transition)
                        .or_default()
                        .push(AdjacentPlace {
                            place: *place,
                            weight: *weight,
                            selector: selector.clone(),
                        });
                }
                NetArc::TransitionToPlace {
                    transition,
                    place,
                    weight,
                    selector,
                } => {
                    transition_to_places_out
                        .entry(*transition)
                        .or_default()
                        .push(AdjacentPlace {
                            place: *place,
                            weight: *weight,
                            selector: selector.clone(),
                        });
                }
            }
        }

        Ok(Net {
            places,
            transitions,
            arcs,
            place_to_transitions,
            transition_to_places_out,
            transition_to_places_in,
        })
    }

    pub fn places(&self) -> impl Iterator<Item = &Place> {
        self.places.values()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(&id)
    }

    pub fn place(&self, id: PlaceId) -> Option<&Place> {
        self.places.get(&id)
    }

    pub fn arcs(&self) -> &[NetArc] {
        &self.arcs
    }

    /// Places feeding into `t` (input places), with weight and selector.
    pub fn in_adjacent_places(&self, t: TransitionId) -> &[AdjacentPlace] {
        self.transition_to_places_in
            .get(&t)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Places `t` produces into (output places), with weight and selector.
    pub fn out_adjacent_places(&self, t: TransitionId) -> &[AdjacentPlace] {
        self.transition_to_places_out
            .get(&t)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Transitions reading from place `p`, with the weight/selector each
    /// would consume at.
    pub fn out_adjacent_transitions(&self, p: PlaceId) -> &[AdjacentTransition] {
        self.place_to_transitions.get(&p).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `{place -> weight}` for every input arc of `t`.
    pub fn in_marking(&self, t: TransitionId) -> HashMap<PlaceId, u64> {
        self.in_adjacent_places(t)
            .iter()
            .map(|ap| (ap.place, ap.weight.get() as u64))
            .collect()
    }

    /// `{place -> weight}` for every output arc of `t`.
    pub fn out_marking(&self, t: TransitionId) -> HashMap<PlaceId, u64> {
        self.out_adjacent_places(t)
            .iter()
            .map(|ap| (ap.place, ap.weight.get() as u64))
            .collect()
    }

    /// The arc directly connecting `place` and `transition`, if any, in
    /// either direction.
    pub fn connecting_arc(&self, place: PlaceId, transition: TransitionId) -> Option<&NetArc> {
        self.arcs
            .iter()
            .find(|a| a.place() == place && a.transition() == transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transition::{always_fatal, ExecutorOutput};
    use std::sync::Arc as StdArc;

    fn noop_transition(id: u64, label: &str, automated: bool) -> Transition {
        Transition::new(
            id,
            label,
            automated,
            always_fatal(),
            StdArc::new(|_input| Box::pin(async { Ok(ExecutorOutput::default()) })),
        )
    }

    #[test]
    fn builds_adjacency_tables() {
        let p1 = Place::new(1, "p1", "unit");
        let p2 = Place::new(2, "p2", "unit");
        let t1 = noop_transition(1, "t1", false);
        let net = Net::new(
            vec![p1, p2],
            vec![t1],
            vec![
                NetArc::input(PlaceId(1), TransitionId(1), 1, "in"),
                NetArc::output(TransitionId(1), PlaceId(2), 1, "out"),
            ],
        )
        .unwrap();

        assert_eq!(net.in_marking(TransitionId(1)).get(&PlaceId(1)), Some(&1));
        assert_eq!(net.out_marking(TransitionId(1)).get(&PlaceId(2)), Some(&1));
        assert_eq!(net.out_adjacent_transitions(PlaceId(1)).len(), 1);
    }

    #[test]
    fn rejects_arc_to_unknown_place() {
        let t1 = noop_transition(1, "t1", false);
        let result = Net::new(vec![], vec![t1], vec![NetArc::input(PlaceId(99), TransitionId(1), 1, "in")]);
        assert!(result.is_err());
    }
}
