//! Topological ordering of a fixture's rules.

use std::collections::{HashMap, VecDeque};

use hf_core::SignalPath;
use hf_project::FixtureSpec;

use crate::error::{EngineError, EngineResult};

/// Compute an evaluation order for the fixture's rules.
///
/// Returns rule indices such that a rule reading another rule's output comes
/// after it. Dependencies on served actuators read the commanded value,
/// which no rule writes, so they add no edge.
pub fn evaluation_order(fixture: &FixtureSpec) -> EngineResult<Vec<usize>> {
    let rules = &fixture.rules;
    let index: HashMap<&SignalPath, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, r)| (&r.output, i))
        .collect();

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
    let mut in_degree = vec![0usize; rules.len()];

    for (to, rule) in rules.iter().enumerate() {
        for dep in &rule.depends_on {
            if fixture.serves(dep) {
                continue;
            }
            if let Some(&from) = index.get(dep) {
                adj[from].push(to);
                in_degree[to] += 1;
            }
        }
    }

    // Kahn's algorithm; ties resolved in declaration order
    let mut queue: VecDeque<usize> = (0..rules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(rules.len());

    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &next in &adj[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != rules.len() {
        let signals = rules
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, r)| r.output.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(EngineError::Cycle { signals });
    }

    Ok(order)
}
