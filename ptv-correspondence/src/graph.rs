use itertools::Itertools;
use log::*;
use ptv_core::Ray;
use ptv_geom::ray_distance;
use std::collections::HashMap;

/// A target addressed by its camera and its position in that camera's target list.
pub(crate) type Node = (usize, usize);

/// Which targets of different cameras are epipolar-consistent with each other.
///
/// Edges always go from the lower camera to the higher one and carry the ray distance as their cost.
pub(crate) struct ConsistencyGraph {
    costs: HashMap<(Node, Node), f64>,
    neighbours: HashMap<Node, Vec<Node>>,
}

impl ConsistencyGraph {
    /// Connects every pair of rays from different cameras that pass closer than `tolerance`.
    ///
    /// `rays[camera][position]` is `None` for targets that could not be backprojected.
    pub fn build(rays: &[Vec<Option<Ray>>], tolerance: f64) -> Self {
        let mut costs = HashMap::new();
        let mut neighbours: HashMap<Node, Vec<Node>> = HashMap::new();
        for (a, b) in (0..rays.len()).tuple_combinations() {
            for (i, ray_a) in rays[a].iter().enumerate() {
                let ray_a = match ray_a {
                    Some(ray) => ray,
                    None => continue,
                };
                for (j, ray_b) in rays[b].iter().enumerate() {
                    let ray_b = match ray_b {
                        Some(ray) => ray,
                        None => continue,
                    };
                    let distance = ray_distance(ray_a, ray_b);
                    if distance < tolerance {
                        trace!("({}, {}) ~ ({}, {}) at {}", a, i, b, j, distance);
                        costs.insert(((a, i), (b, j)), distance);
                        neighbours.entry((a, i)).or_default().push((b, j));
                    }
                }
            }
        }
        debug!("Found {} epipolar-consistent target pairs", costs.len());
        Self { costs, neighbours }
    }

    pub fn cost(&self, a: Node, b: Node) -> Option<f64> {
        let key = if a.0 < b.0 { (a, b) } else { (b, a) };
        self.costs.get(&key).copied()
    }

    /// Every set of targets, at most one per camera, in which each pair is consistent and
    /// which spans at least `min_size` cameras. Non-maximal sets are included so that a
    /// subset can still win when a larger set loses one of its targets to another particle.
    ///
    /// Each clique is returned with its nodes in ascending camera order and its total pairwise cost.
    pub fn cliques(&self, min_size: usize) -> Vec<(Vec<Node>, f64)> {
        let mut starts: Vec<Node> = self.neighbours.keys().copied().collect();
        starts.sort_unstable();
        let mut cliques = vec![];
        let mut clique = vec![];
        for start in starts {
            clique.push(start);
            self.extend(&mut clique, 0.0, min_size, &mut cliques);
            clique.pop();
        }
        cliques
    }

    fn extend(
        &self,
        clique: &mut Vec<Node>,
        cost: f64,
        min_size: usize,
        cliques: &mut Vec<(Vec<Node>, f64)>,
    ) {
        if clique.len() >= min_size {
            cliques.push((clique.clone(), cost));
        }
        let (first, last) = match (clique.first(), clique.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return,
        };
        let candidates = match self.neighbours.get(&first) {
            Some(candidates) => candidates,
            None => return,
        };
        for &next in candidates.iter().filter(|next| next.0 > last.0) {
            let added = clique
                .iter()
                .try_fold(0.0, |sum, &node| self.cost(node, next).map(|c| sum + c));
            if let Some(added) = added {
                clique.push(next);
                self.extend(clique, cost + added, min_size, cliques);
                clique.pop();
            }
        }
    }
}
