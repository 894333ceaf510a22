// Token game - enablement and deterministic token selection

//! # Token Game
//!
//! Given a marking and a net, which transitions could fire right now, and
//! with which tokens? This is the part of the engine most directly
//! "Petri net theory": enablement is a sub-multiset check (§4.C), and
//! token selection is a deterministic, cheap rule rather than an
//! enumeration of every logically possible combination (§9 Open Question —
//! kept as-is; tests in this crate depend on the determinism).

use std::collections::{HashMap, HashSet};

use crate::marking::{ColoredMarking, MarkingLike};
use crate::net::{Net, PlaceId, TransitionId};

/// The set of transitions whose `in_marking` is a sub-multiset of the
/// marking's multiplicity projection. A transition with no input places
/// is always enabled. Blocking/failure state is *not* considered here —
/// that's the scheduler's job (§4.C, §4.F).
pub fn enabled_transitions(net: &Net, marking: &ColoredMarking) -> HashSet<TransitionId> {
    let have = marking.multiplicity();
    net.transitions()
        .filter(|t| {
            let required = net.in_marking(t.id);
            required
                .iter()
                .all(|(place, weight)| have.get(place).copied().unwrap_or(0) >= *weight)
        })
        .map(|t| t.id)
        .collect()
}

/// For transition `t`, the one deterministic token selection the token
/// game offers: for each input place, the first `weight` tokens in
/// iteration order. Returns `None` if `t` isn't actually enabled at
/// `marking` (fewer than `weight` tokens available at some input place).
pub fn consumable_parameters(net: &Net, marking: &ColoredMarking, t: TransitionId) -> Option<ColoredMarking> {
    let mut selection: HashMap<PlaceId, Vec<crate::token::Token>> = HashMap::new();
    for adj in net.in_adjacent_places(t) {
        let available = marking.tokens_at(adj.place);
        let weight = adj.weight.get() as usize;
        if available.len() < weight {
            return None;
        }
        selection.insert(adj.place, available[..weight].to_vec());
    }
    Some(ColoredMarking::from_map(selection))
}

/// Composition of [`enabled_transitions`] and [`consumable_parameters`]
/// for every currently-enabled transition.
pub fn enabled_parameters(net: &Net, marking: &ColoredMarking) -> HashMap<TransitionId, ColoredMarking> {
    enabled_transitions(net, marking)
        .into_iter()
        .filter_map(|t| consumable_parameters(net, marking, t).map(|params| (t, params)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{always_fatal, Arc as NetArc, ExecutorOutput, Place, Transition};
    use crate::token::Token;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    fn noop(id: u64) -> Transition {
        Transition::new(
            id,
            format!("t{id}"),
            false,
            always_fatal(),
            StdArc::new(|_input| Box::pin(async { Ok(ExecutorOutput::default()) })),
        )
    }

    fn sample_net() -> Net {
        Net::new(
            vec![Place::new(1, "p1", "u"), Place::new(2, "p2", "u")],
            vec![noop(1)],
            vec![NetArc::input(PlaceId(1), TransitionId(1), 1, "in")],
        )
        .unwrap()
    }

    #[test]
    fn transition_with_no_inputs_always_enabled() {
        let net = Net::new(vec![], vec![noop(1)], vec![]).unwrap();
        let marking = ColoredMarking::empty();
        assert!(enabled_transitions(&net, &marking).contains(&TransitionId(1)));
    }

    #[test]
    fn enablement_requires_sufficient_tokens() {
        let net = sample_net();
        let empty = ColoredMarking::empty();
        assert!(!enabled_transitions(&net, &empty).contains(&TransitionId(1)));

        let marking = ColoredMarking::single(PlaceId(1), vec![Token::new(json!(1))]);
        assert!(enabled_transitions(&net, &marking).contains(&TransitionId(1)));
    }

    #[test]
    fn consumable_parameters_takes_first_n_in_order() {
        let net = sample_net();
        let marking = ColoredMarking::single(
            PlaceId(1),
            vec![Token::new(json!("a")), Token::new(json!("b"))],
        );
        let params = consumable_parameters(&net, &marking, TransitionId(1)).unwrap();
        assert_eq!(params.tokens_at(PlaceId(1)), &[Token::new(json!("a"))]);
    }
}
