//! Global route planning around islands
//!
//! Islands are inflated by a safety margin and searched as a visibility graph
//! with A*. The node pool, score arrays and open heap are kept between plans
//! so a replan does not allocate once the graph size has settled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec2;

use super::geometry::{distance_to_segment, inflate_polygon, segment_intersects_polygon};
use super::state::Island;
use crate::settings::PlannerTuning;

/// Island pushed outward by the safety margin
#[derive(Debug, Clone, PartialEq)]
pub struct InflatedObstacle {
    pub center: Vec2,
    /// Radius of a circle that contains every inflated vertex
    pub bound: f32,
    pub vertices: Vec<Vec2>,
}

impl InflatedObstacle {
    pub fn new(island: &Island, margin: f32) -> Self {
        let vertices = inflate_polygon(&island.vertices, island.center, margin);
        let bound = vertices
            .iter()
            .map(|v| v.distance(island.center))
            .fold(0.0, f32::max);
        Self {
            center: island.center,
            bound,
            vertices,
        }
    }
}

/// How the last plan was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Straight line was already clear
    Direct,
    /// A* reached the target
    Routed,
    /// Search exhausted; the direct target was returned anyway
    Fallback,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    pos: Vec2,
    /// (obstacle, vertex) for polygon vertices
    owner: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenEntry {
    f: f32,
    node: usize,
}

impl Eq for OpenEntry {}

// Min-heap on f, ties on node index for a stable expansion order
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const START: usize = 0;
const GOAL: usize = 1;

/// Visibility-graph A* planner with a cached obstacle inflation
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    margin: f32,
    max_expansions: usize,
    inflated: Vec<InflatedObstacle>,
    outcome: PlanOutcome,

    // Search arena, reused across plans
    nodes: Vec<Node>,
    g: Vec<f32>,
    parent: Vec<Option<usize>>,
    closed: Vec<bool>,
    open: BinaryHeap<OpenEntry>,
}

impl RoutePlanner {
    pub fn new(tuning: &PlannerTuning) -> Self {
        Self {
            margin: tuning.safety_margin,
            max_expansions: tuning.max_expansions,
            inflated: Vec::new(),
            outcome: PlanOutcome::Direct,
            nodes: Vec::new(),
            g: Vec::new(),
            parent: Vec::new(),
            closed: Vec::new(),
            open: BinaryHeap::new(),
        }
    }

    pub fn inflated(&self) -> &[InflatedObstacle] {
        &self.inflated
    }

    pub fn last_outcome(&self) -> PlanOutcome {
        self.outcome
    }

    /// Rebuild the inflation cache when the island count changes
    fn refresh(&mut self, islands: &[Island]) {
        if self.inflated.len() == islands.len() {
            return;
        }
        self.inflated = islands
            .iter()
            .map(|island| InflatedObstacle::new(island, self.margin))
            .collect();
        log::debug!("Inflated {} islands by {}", islands.len(), self.margin);
    }

    /// Whether segment `a -> b` stays clear of every inflated obstacle
    pub fn is_segment_clear(&self, a: Vec2, b: Vec2) -> bool {
        self.segment_clear_except(a, b, None)
    }

    /// `skip` exempts one obstacle, used for edges running along its own hull
    fn segment_clear_except(&self, a: Vec2, b: Vec2, skip: Option<usize>) -> bool {
        self.inflated.iter().enumerate().all(|(i, obstacle)| {
            Some(i) == skip
                || distance_to_segment(obstacle.center, a, b) > obstacle.bound
                || !segment_intersects_polygon(a, b, &obstacle.vertices)
        })
    }

    fn edge_clear(&self, from: usize, to: usize) -> bool {
        let (na, nb) = (self.nodes[from], self.nodes[to]);
        let skip = match (na.owner, nb.owner) {
            (Some((oa, va)), Some((ob, vb))) if oa == ob => {
                let n = self.inflated[oa].vertices.len();
                let adjacent = (va + 1) % n == vb || (vb + 1) % n == va;
                adjacent.then_some(oa)
            }
            _ => None,
        };
        self.segment_clear_except(na.pos, nb.pos, skip)
    }

    fn reset_arena(&mut self, start: Vec2, target: Vec2) {
        self.nodes.clear();
        self.nodes.push(Node { pos: start, owner: None });
        self.nodes.push(Node { pos: target, owner: None });
        for (oi, obstacle) in self.inflated.iter().enumerate() {
            for (vi, &pos) in obstacle.vertices.iter().enumerate() {
                self.nodes.push(Node {
                    pos,
                    owner: Some((oi, vi)),
                });
            }
        }

        let n = self.nodes.len();
        self.g.clear();
        self.g.resize(n, f32::INFINITY);
        self.parent.clear();
        self.parent.resize(n, None);
        self.closed.clear();
        self.closed.resize(n, false);
        self.open.clear();
    }

    /// Plan a waypoint chain from `start` to `target`
    ///
    /// The result never includes `start`, always ends at `target` and is never
    /// empty. When the search budget runs out the direct target is returned.
    pub fn plan_path(&mut self, start: Vec2, target: Vec2, islands: &[Island]) -> Vec<Vec2> {
        self.refresh(islands);

        if self.is_segment_clear(start, target) {
            self.outcome = PlanOutcome::Direct;
            return vec![target];
        }

        self.reset_arena(start, target);
        self.g[START] = 0.0;
        self.open.push(OpenEntry {
            f: start.distance(target),
            node: START,
        });

        let mut expansions = 0;
        while expansions < self.max_expansions {
            let Some(OpenEntry { node: current, .. }) = self.open.pop() else {
                break;
            };
            if self.closed[current] {
                continue; // Stale heap entry
            }
            if current == GOAL {
                self.outcome = PlanOutcome::Routed;
                return self.reconstruct();
            }
            self.closed[current] = true;
            expansions += 1;

            let here = self.nodes[current].pos;
            for next in 0..self.nodes.len() {
                if next == current || self.closed[next] {
                    continue;
                }
                let there = self.nodes[next].pos;
                let tentative = self.g[current] + here.distance(there);
                if tentative >= self.g[next] || !self.edge_clear(current, next) {
                    continue;
                }
                self.g[next] = tentative;
                self.parent[next] = Some(current);
                self.open.push(OpenEntry {
                    f: tentative + there.distance(target),
                    node: next,
                });
            }
        }

        log::warn!(
            "Route search gave up after {} expansions, sailing direct to ({:.0}, {:.0})",
            expansions,
            target.x,
            target.y
        );
        self.outcome = PlanOutcome::Fallback;
        vec![target]
    }

    fn reconstruct(&self) -> Vec<Vec2> {
        let mut path = Vec::new();
        let mut node = GOAL;
        while let Some(prev) = self.parent[node] {
            path.push(self.nodes[node].pos);
            node = prev;
        }
        path.reverse();
        path
    }
}

impl Default for RoutePlanner {
    fn default() -> Self {
        Self::new(&PlannerTuning::default())
    }
}
