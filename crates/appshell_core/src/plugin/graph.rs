//! Dependency graph over registered plugins.
//!
//! Nodes are plugin indices in registration order. An edge `a -> b` means
//! `a` consumes the token `b` provides.

use super::descriptor::PluginDescriptor;
use super::PluginError;
use crate::token::Token;
use std::collections::BTreeMap;

pub(crate) type Edges = Vec<Vec<usize>>;

/// Resolves every declared token to its provider.
///
/// Required tokens without a provider fail; optional ones are dropped.
pub(crate) fn dependency_edges(
    plugins: &[&PluginDescriptor],
    providers: &BTreeMap<Token, usize>,
) -> Result<Edges, PluginError> {
    let mut edges = Vec::with_capacity(plugins.len());
    for plugin in plugins {
        let mut targets = Vec::new();
        for (token, required) in plugin.dependencies() {
            match providers.get(token) {
                Some(&provider) => targets.push(provider),
                None if required => {
                    return Err(PluginError::UnknownToken {
                        token: token.name().to_string(),
                        required_by: Some(plugin.id.clone()),
                    });
                }
                None => {}
            }
        }
        edges.push(targets);
    }
    Ok(edges)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Returns the first cycle found, as node indices with the start repeated.
pub(crate) fn find_cycle(edges: &Edges) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; edges.len()];
    let mut path = Vec::new();
    for start in 0..edges.len() {
        if marks[start] == Mark::Unvisited {
            if let Some(cycle) = visit(start, edges, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    node: usize,
    edges: &Edges,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    marks[node] = Mark::InProgress;
    path.push(node);
    for &next in &edges[node] {
        match marks[next] {
            Mark::InProgress => {
                let start = path.iter().position(|&entry| entry == next).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            Mark::Unvisited => {
                if let Some(cycle) = visit(next, edges, marks, path) {
                    return Some(cycle);
                }
            }
            Mark::Done => {}
        }
    }
    path.pop();
    marks[node] = Mark::Done;
    None
}

/// Orders `roots` and everything they depend on, dependencies first.
///
/// The graph must be acyclic. Each node appears once; ties follow the order
/// of `roots` and of each plugin's declarations.
pub(crate) fn activation_order(edges: &Edges, roots: &[usize]) -> Vec<usize> {
    let mut placed = vec![false; edges.len()];
    let mut order = Vec::new();
    for &root in roots {
        place(root, edges, &mut placed, &mut order);
    }
    order
}

fn place(node: usize, edges: &Edges, placed: &mut [bool], order: &mut Vec<usize>) {
    if placed[node] {
        return;
    }
    placed[node] = true;
    for &dependency in &edges[node] {
        place(dependency, edges, placed, order);
    }
    order.push(node);
}
