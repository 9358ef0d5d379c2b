//! Layered auto-layout for one pipeline.
//!
//! Nodes become vertices and node/association links become edges. A loose
//! link end gets a small stand-in vertex so detached links are placed with
//! the graph instead of being left behind. The pipeline then goes through
//! the usual layered pipeline:
//!
//! 1. cycle removal (DFS back edges are reversed)
//! 2. longest-path rank assignment
//! 3. barycenter ordering within ranks (alternating sweeps)
//! 4. coordinate assignment, ranks centered against the widest rank
//!
//! The result is a pure function of the pipeline, direction and config.

use crate::config::{AutoLayoutConfig, LayoutDirection};
use crate::id::ObjectId;
use crate::model::*;
use crate::store::LinkEndPositions;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsEvent, depth_first_search};
use std::collections::{HashMap, HashSet};

/// Positions computed by [`auto_layout`]. Sizes are carried over unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutResult {
    pub nodes: Vec<(ObjectId, Bounds)>,
    pub links: Vec<(ObjectId, LinkEndPositions)>,
}

#[derive(Debug, Clone, Copy)]
enum Vertex {
    Node(usize),
    LooseSrc(usize),
    LooseTrg(usize),
}

struct LayoutGraph {
    vertices: Vec<Vertex>,
    sizes: Vec<(f64, f64)>,
    edges: Vec<(usize, usize)>,
}

pub fn auto_layout(
    pipeline: &Pipeline,
    config: &AutoLayoutConfig,
    direction: LayoutDirection,
) -> LayoutResult {
    let graph = build_graph(pipeline, config);
    if graph.vertices.is_empty() {
        return LayoutResult::default();
    }
    let dag_edges = remove_cycles(graph.vertices.len(), &graph.edges);
    let ranks = assign_ranks(graph.vertices.len(), &dag_edges);
    let ordering = order_ranks(&ranks, &dag_edges, config.ordering_passes);
    let positions = assign_coordinates(&ordering, &graph.sizes, config, direction);

    let mut result = LayoutResult::default();
    let mut loose: HashMap<usize, LinkEndPositions> = HashMap::new();
    for (v, vertex) in graph.vertices.iter().enumerate() {
        let (x, y) = positions[v];
        let (w, h) = graph.sizes[v];
        match *vertex {
            Vertex::Node(i) => result
                .nodes
                .push((pipeline.nodes[i].id, Bounds::new(x, y, w, h))),
            Vertex::LooseSrc(l) => {
                loose.entry(l).or_default().src_pos = Some(Point::new(x + w / 2.0, y + h / 2.0));
            }
            Vertex::LooseTrg(l) => {
                loose.entry(l).or_default().trg_pos = Some(Point::new(x + w / 2.0, y + h / 2.0));
            }
        }
    }
    let mut loose: Vec<(usize, LinkEndPositions)> = loose.into_iter().collect();
    loose.sort_by_key(|(l, _)| *l);
    result.links = loose
        .into_iter()
        .map(|(l, pos)| (pipeline.links[l].id, pos))
        .collect();
    result
}

fn build_graph(pipeline: &Pipeline, config: &AutoLayoutConfig) -> LayoutGraph {
    let mut vertices = Vec::new();
    let mut sizes = Vec::new();
    let mut index_of: HashMap<ObjectId, usize> = HashMap::new();

    for (i, node) in pipeline.nodes.iter().enumerate() {
        let b = node.bounds();
        index_of.insert(node.id, vertices.len());
        vertices.push(Vertex::Node(i));
        sizes.push((b.width, b.height));
    }

    let mut edges = Vec::new();
    for (l, link) in pipeline.links.iter().enumerate() {
        if link.link_type == LinkType::CommentLink {
            continue;
        }
        let mut end = |end: &LinkEnd, vertex: Vertex| -> Option<usize> {
            match end {
                LinkEnd::Attached { obj_id, .. } => index_of.get(obj_id).copied(),
                LinkEnd::Detached(_) => {
                    vertices.push(vertex);
                    sizes.push((config.dummy_size, config.dummy_size));
                    Some(vertices.len() - 1)
                }
            }
        };
        let src = end(&link.src, Vertex::LooseSrc(l));
        let trg = end(&link.trg, Vertex::LooseTrg(l));
        if let (Some(s), Some(t)) = (src, trg) {
            if s != t {
                edges.push((s, t));
            }
        }
    }

    LayoutGraph {
        vertices,
        sizes,
        edges,
    }
}

/// Reverse every DFS back edge so the remaining graph is acyclic.
fn remove_cycles(count: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    for &(s, t) in edges {
        graph.add_edge(NodeIndex::new(s), NodeIndex::new(t), ());
    }

    let mut back_edges: HashSet<(usize, usize)> = HashSet::new();
    depth_first_search(&graph, graph.node_indices(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back_edges.insert((u.index(), v.index()));
        }
    });

    edges
        .iter()
        .map(|&(s, t)| if back_edges.contains(&(s, t)) { (t, s) } else { (s, t) })
        .collect()
}

/// Longest-path ranking: sources sit at rank 0.
fn assign_ranks(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(count, edges.len());
    for _ in 0..count {
        graph.add_node(());
    }
    for &(s, t) in edges {
        graph.add_edge(NodeIndex::new(s), NodeIndex::new(t), ());
    }

    let order: Vec<usize> = match petgraph::algo::toposort(&graph, None) {
        Ok(order) => order.into_iter().map(|n| n.index()).collect(),
        Err(cycle) => {
            log::error!("auto-layout: cycle left at vertex {}", cycle.node_id().index());
            (0..count).collect()
        }
    };

    let mut ranks = vec![0usize; count];
    for v in order {
        for n in graph.neighbors(NodeIndex::new(v)) {
            ranks[n.index()] = ranks[n.index()].max(ranks[v] + 1);
        }
    }
    ranks
}

/// Order vertices within each rank by the barycenter of their neighbours
/// in the adjacent rank. Sorting is stable, so ties keep insertion order.
fn order_ranks(ranks: &[usize], edges: &[(usize, usize)], passes: usize) -> Vec<Vec<usize>> {
    let rank_count = ranks.iter().copied().max().map_or(0, |m| m + 1);
    let mut ordering: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (v, &r) in ranks.iter().enumerate() {
        ordering[r].push(v);
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); ranks.len()];
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); ranks.len()];
    for &(s, t) in edges {
        succs[s].push(t);
        preds[t].push(s);
    }

    for _ in 0..passes {
        for r in 1..rank_count {
            sort_by_barycenter(&mut ordering, r, r - 1, &preds);
        }
        for r in (0..rank_count.saturating_sub(1)).rev() {
            sort_by_barycenter(&mut ordering, r, r + 1, &succs);
        }
    }
    ordering
}

fn sort_by_barycenter(
    ordering: &mut [Vec<usize>],
    rank: usize,
    fixed_rank: usize,
    neighbours: &[Vec<usize>],
) {
    let fixed: HashMap<usize, f64> = ordering[fixed_rank]
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i as f64))
        .collect();
    let keys: HashMap<usize, f64> = ordering[rank]
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let positions: Vec<f64> = neighbours[v]
                .iter()
                .filter_map(|n| fixed.get(n).copied())
                .collect();
            let key = if positions.is_empty() {
                i as f64
            } else {
                positions.iter().sum::<f64>() / positions.len() as f64
            };
            (v, key)
        })
        .collect();
    ordering[rank].sort_by(|a, b| keys[a].total_cmp(&keys[b]));
}

/// Top-left position for every vertex.
fn assign_coordinates(
    ordering: &[Vec<usize>],
    sizes: &[(f64, f64)],
    config: &AutoLayoutConfig,
    direction: LayoutDirection,
) -> Vec<(f64, f64)> {
    // (extent along the rank axis, extent across it)
    let extent = |v: usize| -> (f64, f64) {
        let (w, h) = sizes[v];
        match direction {
            LayoutDirection::Horizontal => (w, h),
            LayoutDirection::Vertical => (h, w),
        }
    };

    let rank_depth: Vec<f64> = ordering
        .iter()
        .map(|rank| rank.iter().map(|&v| extent(v).0).fold(0.0, f64::max))
        .collect();
    let rank_breadth: Vec<f64> = ordering
        .iter()
        .map(|rank| {
            let sum: f64 = rank.iter().map(|&v| extent(v).1).sum();
            sum + config.node_separation * rank.len().saturating_sub(1) as f64
        })
        .collect();
    let widest = rank_breadth.iter().copied().fold(0.0, f64::max);

    let mut positions = vec![(0.0, 0.0); sizes.len()];
    let mut along = 0.0;
    for (r, rank) in ordering.iter().enumerate() {
        let mut across = (widest - rank_breadth[r]) / 2.0;
        for &v in rank {
            let (depth, breadth) = extent(v);
            let a = along + (rank_depth[r] - depth) / 2.0;
            positions[v] = match direction {
                LayoutDirection::Horizontal => (config.margin_x + a, config.margin_y + across),
                LayoutDirection::Vertical => (config.margin_x + across, config.margin_y + a),
            };
            across += breadth + config.node_separation;
        }
        along += rank_depth[r] + config.rank_separation;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> Node {
        let mut n = Node::new(id, NodeType::ExecutionNode);
        n.width = 100.0;
        n.height = 40.0;
        n
    }

    fn link(id: &str, src: &str, trg: &str) -> Link {
        Link::new(
            id,
            LinkType::NodeLink,
            LinkEnd::attached(ObjectId::intern(src), None),
            LinkEnd::attached(ObjectId::intern(trg), None),
        )
    }

    fn chain() -> Pipeline {
        let mut p = Pipeline::new("layout_p");
        p.nodes = vec![node("la"), node("lb"), node("lc")];
        p.links = vec![link("l_ab", "la", "lb"), link("l_bc", "lb", "lc")];
        p
    }

    fn x_of(result: &LayoutResult, id: &str) -> f64 {
        result
            .nodes
            .iter()
            .find(|(n, _)| n.as_str() == id)
            .map(|(_, b)| b.x)
            .unwrap()
    }

    #[test]
    fn horizontal_chain_runs_left_to_right() {
        let cfg = AutoLayoutConfig::default();
        let result = auto_layout(&chain(), &cfg, LayoutDirection::Horizontal);
        assert_eq!(x_of(&result, "la"), cfg.margin_x);
        assert_eq!(x_of(&result, "lb"), cfg.margin_x + 100.0 + cfg.rank_separation);
        assert!(x_of(&result, "lc") > x_of(&result, "lb"));
    }

    #[test]
    fn vertical_chain_runs_top_to_bottom() {
        let cfg = AutoLayoutConfig::default();
        let result = auto_layout(&chain(), &cfg, LayoutDirection::Vertical);
        let ys: Vec<f64> = result.nodes.iter().map(|(_, b)| b.y).collect();
        assert!(ys[0] < ys[1] && ys[1] < ys[2]);
    }

    #[test]
    fn cycles_still_lay_out() {
        let mut p = chain();
        p.links.push(link("l_ca", "lc", "la"));
        let result = auto_layout(&p, &AutoLayoutConfig::default(), LayoutDirection::Horizontal);
        assert_eq!(result.nodes.len(), 3);
    }

    #[test]
    fn loose_link_ends_get_positions() {
        let mut p = chain();
        p.links.push(Link::new(
            "l_loose",
            LinkType::NodeLink,
            LinkEnd::attached(ObjectId::intern("lc"), None),
            LinkEnd::Detached(Point::new(0.0, 0.0)),
        ));
        let result = auto_layout(&p, &AutoLayoutConfig::default(), LayoutDirection::Horizontal);
        let (id, pos) = result.links[0];
        assert_eq!(id.as_str(), "l_loose");
        assert!(pos.src_pos.is_none());
        assert!(pos.trg_pos.unwrap().x > x_of(&result, "lc"));
    }

    #[test]
    fn layout_is_deterministic() {
        let p = chain();
        let cfg = AutoLayoutConfig::default();
        assert_eq!(
            auto_layout(&p, &cfg, LayoutDirection::Horizontal),
            auto_layout(&p, &cfg, LayoutDirection::Horizontal)
        );
    }
}
