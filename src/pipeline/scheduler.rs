//! Concurrent executor for dependency graphs.
//!
//! Every node whose dependencies have all completed runs on its own scoped
//! thread; a node's completion releases the dependents waiting on it.
//! Nodes communicate only through what they write to disk, so the
//! scheduler shares nothing with them beyond the node value itself.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, SiteError};

use super::graph::DependencyGraph;

/// A node that ran to completion.
#[derive(Debug)]
pub struct Completed<N, T> {
    pub node: N,
    pub output: T,
    pub elapsed: Duration,
}

/// Outcome of executing a graph.
#[derive(Debug)]
pub struct RunSummary<N, T> {
    /// Nodes that succeeded, in completion order.
    pub completed: Vec<Completed<N, T>>,

    /// Nodes that returned an error or panicked, in completion order.
    pub failed: Vec<(N, SiteError)>,

    /// Nodes never started because an upstream node failed.
    pub skipped: Vec<N>,
}

impl<N, T> Default for RunSummary<N, T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<N, T> RunSummary<N, T> {
    /// Check if every node completed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Position of `node` in completion order.
    pub fn completion_index(&self, node: &N) -> Option<usize>
    where
        N: PartialEq,
    {
        self.completed.iter().position(|c| &c.node == node)
    }

    /// Convert into the completed nodes, or the first failure's error.
    pub fn into_result(self) -> Result<Vec<Completed<N, T>>> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(self.completed),
        }
    }
}

/// Execute every node of `graph` with `run`, honouring dependencies.
///
/// Ready nodes run concurrently. After the first failure no further nodes
/// are started; nodes already running are awaited. A cyclic graph is
/// rejected before anything runs.
pub fn execute<N, T, F>(graph: &DependencyGraph<N>, run: F) -> Result<RunSummary<N, T>>
where
    N: Ord + Clone + Send + Sync + fmt::Display,
    T: Send,
    F: Fn(&N) -> Result<T> + Sync,
{
    graph
        .topological_sort()
        .map_err(|e| SiteError::Graph {
            message: e.to_string(),
        })?;

    let mut pending: BTreeMap<N, usize> = graph
        .nodes()
        .map(|node| (node.clone(), graph.dependency_count(node)))
        .collect();

    let mut summary = RunSummary::default();
    let run = &run;

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel::<(N, Result<T>, Duration)>();

        let start = |node: N| {
            let tx = tx.clone();
            tracing::debug!(task = %node, "starting");
            scope.spawn(move || {
                let started = Instant::now();
                let outcome = catch_unwind(AssertUnwindSafe(|| run(&node)))
                    .unwrap_or_else(|payload| {
                        Err(SiteError::Task {
                            task: node.to_string(),
                            message: format!("panicked: {}", panic_message(payload.as_ref())),
                        })
                    });
                let _ = tx.send((node, outcome, started.elapsed()));
            });
        };

        let ready: Vec<N> = pending
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(node, _)| node.clone())
            .collect();

        let mut running = 0usize;
        for node in ready {
            pending.remove(&node);
            start(node);
            running += 1;
        }

        while running > 0 {
            let Ok((node, outcome, elapsed)) = rx.recv() else {
                break;
            };
            running -= 1;

            match outcome {
                Ok(output) => {
                    tracing::debug!(task = %node, ?elapsed, "finished");

                    if summary.failed.is_empty() {
                        for dependent in graph.dependents_of(&node) {
                            let released = match pending.get_mut(dependent) {
                                Some(count) => {
                                    *count = count.saturating_sub(1);
                                    *count == 0
                                }
                                None => false,
                            };

                            if released {
                                pending.remove(dependent);
                                start(dependent.clone());
                                running += 1;
                            }
                        }
                    }

                    summary.completed.push(Completed {
                        node,
                        output,
                        elapsed,
                    });
                }
                Err(err) => {
                    tracing::warn!(task = %node, error = %err, "failed");
                    summary.failed.push((node, err));
                }
            }
        }
    });

    summary.skipped = pending.into_keys().collect();
    Ok(summary)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
