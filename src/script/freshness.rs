/// In-process timestamp evaluation of the dependency graph
///
/// Applies make's rule to the graph without make: a target is out of date when
/// it is missing or older than any of its dependencies, after those have been
/// brought up to date themselves. Context markers are refreshed on the way;
/// gatekeepers are only reported, running them is up to the caller.
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

use super::graph::{Action, DepGraph, Node};
use super::store::ContextStore;
use crate::logging::services;

#[derive(Error, Debug)]
pub enum FreshnessError {
    #[error("No rule to make target '{}'", .path.display())]
    Missing { path: PathBuf },

    #[error("'{}' does not exist yet; build it with the pipeline first", .path.display())]
    Unbuilt { path: PathBuf },

    #[error("Dependency cycle through '{}'", .path.display())]
    Cycle { path: PathBuf },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub struct Freshness<'a> {
    graph: &'a DepGraph,
    store: &'a ContextStore,
    times: HashMap<Node, SystemTime>,
    visiting: HashSet<Node>,
    refreshed: usize,
}

impl<'a> Freshness<'a> {
    pub fn new(graph: &'a DepGraph, store: &'a ContextStore) -> Self {
        Self {
            graph,
            store,
            times: HashMap::new(),
            visiting: HashSet::new(),
            refreshed: 0,
        }
    }

    /// Context markers refreshed so far
    pub fn refreshed(&self) -> usize {
        self.refreshed
    }

    /// Whether a target has to be rebuilt. Its dependencies are brought up to
    /// date first; the target itself is left alone.
    pub fn outdated(&mut self, node: &Node) -> Result<bool, FreshnessError> {
        let path = node.path(self.store);
        if self.graph.rule(node).is_none() {
            return Err(FreshnessError::Missing { path });
        }
        let (_, stale) = self.enter(node, |this| this.compare(node))?;
        Ok(stale)
    }

    /// Bring a target up to date and return its effective modification time
    pub fn update(&mut self, node: &Node) -> Result<SystemTime, FreshnessError> {
        if let Some(time) = self.times.get(node) {
            return Ok(*time);
        }
        let time = self.enter(node, |this| this.evaluate(node))?;
        self.times.insert(node.clone(), time);
        Ok(time)
    }

    fn enter<T>(
        &mut self,
        node: &Node,
        f: impl FnOnce(&mut Self) -> Result<T, FreshnessError>,
    ) -> Result<T, FreshnessError> {
        if !self.visiting.insert(node.clone()) {
            return Err(FreshnessError::Cycle {
                path: node.path(self.store),
            });
        }
        let result = f(self);
        self.visiting.remove(node);
        result
    }

    /// Own mtime (if any) and whether any dependency is newer
    fn compare(&mut self, node: &Node) -> Result<(Option<SystemTime>, bool), FreshnessError> {
        let graph = self.graph;
        let own = self.store.modified(&node.path(self.store));
        let Some(rule) = graph.rule(node) else {
            return Ok((own, false));
        };

        let mut newest: Option<SystemTime> = None;
        for dep in &rule.deps {
            let time = self.update(dep)?;
            newest = Some(newest.map_or(time, |n| n.max(time)));
        }

        let stale = match (own, newest) {
            (None, _) => true,
            (Some(own), Some(newest)) => newest > own,
            (Some(_), None) => false,
        };
        Ok((own, stale))
    }

    fn evaluate(&mut self, node: &Node) -> Result<SystemTime, FreshnessError> {
        let path = node.path(self.store);
        let Some(rule) = self.graph.rule(node) else {
            return self
                .store
                .modified(&path)
                .ok_or(FreshnessError::Missing { path });
        };
        let action = rule.action.clone();

        let (own, stale) = self.compare(node)?;
        match (own, stale) {
            (Some(own), false) => Ok(own),
            (own, _) => match (action, node) {
                (Action::Mark, Node::Artifact(kind, source)) => {
                    self.store.mark_fresh(source, *kind)?;
                    self.refreshed += 1;
                    debug!(
                        service = services::GRAPH,
                        operation = "refresh",
                        path = %path.display(),
                        "context marker refreshed"
                    );
                    Ok(self.store.modified(&path).unwrap_or_else(SystemTime::now))
                }
                // A check that would run counts as remade
                (Action::Check, _) => Ok(SystemTime::now()),
                (_, _) => own.ok_or(FreshnessError::Unbuilt { path }),
            },
        }
    }
}
