//! Ranked-pairs (Tideman/Condorcet) consensus over sibling ranking
//! submissions. Pure function, free of persistence concerns, so it stays
//! directly testable.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// A candidate pair locked into the result DAG, with its signed margin.
struct Pair {
    winner: Uuid,
    loser: Uuid,
    margin: i64,
}

/// Aggregate a set of per-worker orderings over sibling ids into a single
/// total order on their common candidate set.
///
/// Returns `None` if fewer than two orderings share a candidate set (the
/// parent is left out of scoring this round, same as an "unscoreable
/// parent" in the upstream design).
pub fn ranked_pairs(orderings: &[Vec<Uuid>]) -> Option<Vec<Uuid>> {
    let common = common_candidates(orderings)?;
    if common.len() < 2 {
        return None;
    }

    let restricted: Vec<Vec<Uuid>> = orderings
        .iter()
        .map(|o| o.iter().copied().filter(|id| common.contains(id)).collect())
        .collect();

    let mut pairs = Vec::new();
    let ids: Vec<Uuid> = common.iter().copied().collect();
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (a, b) = (ids[i], ids[j]);
            let margin = signed_margin(&restricted, a, b);
            match margin.cmp(&0) {
                Ordering::Greater => pairs.push(Pair { winner: a, loser: b, margin }),
                Ordering::Less => pairs.push(Pair { winner: b, loser: a, margin: -margin }),
                Ordering::Equal => {
                    // No majority either way; both directions contribute no edge.
                }
            }
        }
    }

    pairs.sort_by(|p, q| {
        q.margin
            .cmp(&p.margin)
            .then_with(|| p.winner.cmp(&q.winner))
            .then_with(|| p.loser.cmp(&q.loser))
    });

    let mut uf = UnionFind::new(&ids);
    let mut edges: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut in_degree: HashMap<Uuid, usize> = ids.iter().map(|id| (*id, 0)).collect();

    for pair in pairs {
        if uf.connected(pair.winner, pair.loser) {
            continue;
        }
        uf.union(pair.winner, pair.loser);
        edges.entry(pair.winner).or_default().push(pair.loser);
        *in_degree.get_mut(&pair.loser).unwrap() += 1;
    }

    Some(topological_order(&ids, &edges, in_degree))
}

/// Intersection of candidate ids across every ordering. `None` if the input
/// is empty.
fn common_candidates(orderings: &[Vec<Uuid>]) -> Option<HashSet<Uuid>> {
    let mut iter = orderings.iter();
    let first: HashSet<Uuid> = iter.next()?.iter().copied().collect();
    Some(iter.fold(first, |acc, o| {
        let this: HashSet<Uuid> = o.iter().copied().collect();
        acc.intersection(&this).copied().collect()
    }))
}

fn signed_margin(orderings: &[Vec<Uuid>], a: Uuid, b: Uuid) -> i64 {
    let mut a_before_b = 0i64;
    let mut b_before_a = 0i64;
    for order in orderings {
        let pos_a = order.iter().position(|id| *id == a);
        let pos_b = order.iter().position(|id| *id == b);
        match (pos_a, pos_b) {
            (Some(pa), Some(pb)) if pa < pb => a_before_b += 1,
            (Some(pa), Some(pb)) if pb < pa => b_before_a += 1,
            _ => {}
        }
    }
    a_before_b - b_before_a
}

/// Peel the unique source of the locked DAG repeatedly to build the order.
fn topological_order(
    ids: &[Uuid],
    edges: &HashMap<Uuid, Vec<Uuid>>,
    mut in_degree: HashMap<Uuid, usize>,
) -> Vec<Uuid> {
    let mut remaining: HashSet<Uuid> = ids.iter().copied().collect();
    let mut order = Vec::with_capacity(ids.len());

    while !remaining.is_empty() {
        let mut sources: Vec<Uuid> = remaining
            .iter()
            .copied()
            .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
            .collect();
        sources.sort();
        let Some(source) = sources.into_iter().next() else {
            // Should not happen: the lock step guarantees acyclicity.
            break;
        };
        remaining.remove(&source);
        order.push(source);
        if let Some(targets) = edges.get(&source) {
            for t in targets {
                if let Some(deg) = in_degree.get_mut(t) {
                    *deg = deg.saturating_sub(1);
                }
            }
        }
    }

    order
}

struct UnionFind {
    parent: HashMap<Uuid, Uuid>,
}

impl UnionFind {
    fn new(ids: &[Uuid]) -> Self {
        Self {
            parent: ids.iter().map(|id| (*id, *id)).collect(),
        }
    }

    fn find(&mut self, id: Uuid) -> Uuid {
        let p = self.parent[&id];
        if p == id {
            return id;
        }
        let root = self.find(p);
        self.parent.insert(id, root);
        root
    }

    fn connected(&mut self, a: Uuid, b: Uuid) -> bool {
        self.find(a) == self.find(b)
    }

    fn union(&mut self, a: Uuid, b: Uuid) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn unanimous_ordering_is_preserved() {
        let ids = uuids(3);
        let orderings = vec![ids.clone(), ids.clone(), ids.clone()];
        assert_eq!(ranked_pairs(&orderings), Some(ids));
    }

    #[test]
    fn fewer_than_two_common_candidates_returns_none() {
        let a = Uuid::new_v4();
        let orderings = vec![vec![a]];
        assert_eq!(ranked_pairs(&orderings), None);
    }

    #[test]
    fn empty_input_returns_none() {
        assert_eq!(ranked_pairs(&[]), None);
    }

    #[test]
    fn majority_wins_over_minority() {
        let ids = uuids(2);
        let (a, b) = (ids[0], ids[1]);
        let orderings = vec![vec![a, b], vec![a, b], vec![b, a]];
        assert_eq!(ranked_pairs(&orderings), Some(vec![a, b]));
    }

    #[test]
    fn cyclic_preferences_resolve_deterministically() {
        let ids = uuids(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        // a>b>c, b>c>a, c>a>b: a perfect cycle with equal margins each way.
        let orderings = vec![vec![a, b, c], vec![b, c, a], vec![c, a, b]];
        let result = ranked_pairs(&orderings).unwrap();
        assert_eq!(result.len(), 3);
        let mut sorted_input = ids.clone();
        sorted_input.sort();
        let mut sorted_result = result.clone();
        sorted_result.sort();
        assert_eq!(sorted_input, sorted_result);
    }

    #[test]
    fn consistent_extension_preserves_existing_order() {
        let ids = uuids(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let base = vec![vec![a, b, c], vec![a, b, c]];
        let base_result = ranked_pairs(&base).unwrap();

        let mut extended = base.clone();
        extended.push(vec![a, b, c]);
        let extended_result = ranked_pairs(&extended).unwrap();

        assert_eq!(base_result, extended_result);
    }
}
