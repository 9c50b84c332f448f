//! Directed-graph traversal primitives for rowbatch.
//!
//! A graph is a dense adjacency list: vertex `v`'s children live in
//! `graph[v]`. Vertices are plain indices, so validity is a bounds check.
//! All traversals are iterative with an explicit frame stack; parent chains
//! can be arbitrarily deep and must never hit the call-stack limit.
//!
//! Nothing in this crate knows about rows or batches; it only walks graphs.

use std::collections::BTreeSet;

use thiserror::Error;

/// Adjacency-list graph: one child set per vertex, indexed densely from zero.
pub type AdjacencyList = [BTreeSet<usize>];

/// Errors from graph traversal. Both variants signal a malformed graph and
/// are raised before any visit hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GraphError {
    /// A child set references a vertex with no entry in the graph.
    #[error("child vertex {child} of vertex {parent} is out of bounds (graph has {len} vertices)")]
    ChildOutOfBounds {
        parent: usize,
        child: usize,
        len: usize,
    },

    /// The visitation order names a vertex with no entry in the graph.
    #[error("visitation-order vertex {root} is out of bounds (graph has {len} vertices)")]
    RootOutOfBounds { root: usize, len: usize },
}

/// Iterative depth-first search with first-visit and last-visit hooks.
///
/// `on_first_visit(vertex, parent)` fires the first time a vertex is
/// discovered; `parent` is the vertex whose traversal reached it, or `None`
/// for a root start. `on_last_visit(vertex)` fires after all of the vertex's
/// descendants have been fully visited (post-order).
///
/// `visitation_order`, when given, both restricts and orders the root-level
/// starting vertices; otherwise every vertex is a candidate root in index
/// order. Vertices reachable only from outside the order are not visited.
pub fn depth_first_search<F, L>(
    graph: &AdjacencyList,
    visitation_order: Option<&[usize]>,
    on_first_visit: F,
    on_last_visit: L,
) -> Result<(), GraphError>
where
    F: FnMut(usize, Option<usize>),
    L: FnMut(usize),
{
    validate(graph, visitation_order)?;
    match visitation_order {
        Some(order) => dfs_unchecked(graph, order.iter().copied(), on_first_visit, on_last_visit),
        None => dfs_unchecked(graph, 0..graph.len(), on_first_visit, on_last_visit),
    }
    Ok(())
}

/// Topological sort via DFS post-order, reversed.
///
/// Every vertex precedes all vertices reachable from it. The relative order
/// of independent branches is unspecified, and cycles are not detected; run
/// [`contains_cycle`] first if correctness depends on acyclicity.
///
/// `visitation_order` restricts the sort to the vertices reachable from the
/// given roots, which is how callers sort one component of a larger graph.
pub fn topological_sort(
    graph: &AdjacencyList,
    visitation_order: Option<&[usize]>,
) -> Result<Vec<usize>, GraphError> {
    let mut order = Vec::with_capacity(graph.len());
    depth_first_search(graph, visitation_order, |_, _| {}, |v| order.push(v))?;
    order.reverse();
    Ok(order)
}

/// Connected components of the undirected view of an edge set.
///
/// Builds a bidirectional adjacency over `vertex_count` vertices, then runs
/// one DFS pass: each newly discovered root opens a fresh component and every
/// vertex reached from it inherits the parent's component label. Components
/// come back in discovery order, each listing its vertices in visit order.
///
/// Edges referencing vertices at or beyond `vertex_count` are rejected.
pub fn undirected_connected_components(
    vertex_count: usize,
    edges: &[(usize, usize)],
) -> Result<Vec<Vec<usize>>, GraphError> {
    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); vertex_count];
    for &(a, b) in edges {
        if a >= vertex_count || b >= vertex_count {
            return Err(GraphError::ChildOutOfBounds {
                parent: a,
                child: b,
                len: vertex_count,
            });
        }
        adjacency[a].insert(b);
        adjacency[b].insert(a);
    }

    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut component_of: Vec<usize> = vec![usize::MAX; vertex_count];
    dfs_unchecked(
        &adjacency,
        0..vertex_count,
        |v, parent| {
            let label = match parent {
                Some(p) => component_of[p],
                None => {
                    components.push(Vec::new());
                    components.len() - 1
                }
            };
            component_of[v] = label;
            components[label].push(v);
        },
        |_| {},
    );
    Ok(components)
}

/// Whether the directed graph contains a cycle (self-loops included).
///
/// Iterative three-color walk: a vertex is gray while its subtree is being
/// explored and black once finished; an edge into a gray vertex is a back
/// edge. Out-of-bounds children count as no cycle here; traversals report
/// them as errors instead.
pub fn contains_cycle(graph: &AdjacencyList) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color = vec![Color::White; graph.len()];
    let mut stack: Vec<Frame> = Vec::new();
    for root in 0..graph.len() {
        if color[root] != Color::White {
            continue;
        }
        stack.push(Frame::Enter(root, None));
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(v, _) => {
                    if color[v] == Color::Gray {
                        return true;
                    }
                    if color[v] == Color::Black {
                        continue;
                    }
                    color[v] = Color::Gray;
                    stack.push(Frame::Exit(v));
                    for &child in graph[v].iter().rev() {
                        if child >= graph.len() {
                            continue;
                        }
                        match color[child] {
                            Color::Gray => return true,
                            Color::White => stack.push(Frame::Enter(child, Some(v))),
                            Color::Black => {}
                        }
                    }
                }
                Frame::Exit(v) => color[v] = Color::Black,
            }
        }
    }
    false
}

enum Frame {
    Enter(usize, Option<usize>),
    Exit(usize),
}

fn validate(graph: &AdjacencyList, visitation_order: Option<&[usize]>) -> Result<(), GraphError> {
    let len = graph.len();
    for (parent, children) in graph.iter().enumerate() {
        // Child sets are ordered, so the largest entry is enough.
        if let Some(&child) = children.iter().next_back() {
            if child >= len {
                return Err(GraphError::ChildOutOfBounds { parent, child, len });
            }
        }
    }
    if let Some(order) = visitation_order {
        for &root in order {
            if root >= len {
                return Err(GraphError::RootOutOfBounds { root, len });
            }
        }
    }
    Ok(())
}

/// Core DFS loop. Callers guarantee every child index and root is in bounds.
fn dfs_unchecked<R, F, L>(
    graph: &AdjacencyList,
    roots: R,
    mut on_first_visit: F,
    mut on_last_visit: L,
) where
    R: IntoIterator<Item = usize>,
    F: FnMut(usize, Option<usize>),
    L: FnMut(usize),
{
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<Frame> = Vec::new();
    for root in roots {
        if visited[root] {
            continue;
        }
        stack.push(Frame::Enter(root, None));
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(v, parent) => {
                    if visited[v] {
                        continue;
                    }
                    visited[v] = true;
                    on_first_visit(v, parent);
                    stack.push(Frame::Exit(v));
                    // Reverse push so children are entered in ascending order.
                    for &child in graph[v].iter().rev() {
                        if !visited[child] {
                            stack.push(Frame::Enter(child, Some(v)));
                        }
                    }
                }
                Frame::Exit(v) => on_last_visit(v),
            }
        }
    }
}
