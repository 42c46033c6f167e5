//! Radial tree index over a [`Feeder`].
//!
//! The feeder is loaded into an undirected petgraph and walked breadth-first
//! from the slack bus. Every branch is oriented parent → child by that walk,
//! so the declared from/to direction in the line table never changes the
//! model. The walk also proves radiality: an edge reaching an already visited
//! bus closes a loop, and any bus the walk never reaches is islanded.

use crate::error::{CapsiteError, CapsiteResult};
use crate::Feeder;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

/// A branch with its tree orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientedBranch {
    /// Position in [`Feeder::branches`]
    pub branch: usize,
    /// Parent bus position (closer to the slack)
    pub from: usize,
    /// Child bus position
    pub to: usize,
    /// True when the line table declared the branch child → parent
    pub reversed: bool,
}

#[derive(Debug, Clone)]
pub struct TopologyIndex {
    slack: usize,
    oriented: Vec<OrientedBranch>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl TopologyIndex {
    pub fn build(feeder: &Feeder) -> CapsiteResult<Self> {
        let buses = feeder.buses();
        let branches = feeder.branches();

        let mut graph = UnGraph::<usize, usize>::with_capacity(buses.len(), branches.len());
        let nodes: Vec<NodeIndex> = (0..buses.len()).map(|i| graph.add_node(i)).collect();

        let mut seen_pairs: HashMap<(usize, usize), usize> = HashMap::new();
        for (idx, branch) in branches.iter().enumerate() {
            let entity = branch.id.entity();
            let from = feeder.bus_index(branch.from_bus).ok_or_else(|| {
                CapsiteError::formulation(
                    entity.clone(),
                    format!("from-bus {} is not declared", branch.from_bus),
                )
            })?;
            let to = feeder.bus_index(branch.to_bus).ok_or_else(|| {
                CapsiteError::formulation(
                    entity.clone(),
                    format!("to-bus {} is not declared", branch.to_bus),
                )
            })?;
            if from == to {
                return Err(CapsiteError::config(
                    entity,
                    format!("branch connects bus {} to itself", branch.from_bus),
                ));
            }
            let key = (from.min(to), from.max(to));
            if let Some(&first) = seen_pairs.get(&key) {
                return Err(CapsiteError::config(
                    entity,
                    format!(
                        "parallel to branch {} between buses {} and {}; a radial feeder has one branch per bus pair",
                        branches[first].id, branch.from_bus, branch.to_bus
                    ),
                ));
            }
            seen_pairs.insert(key, idx);
            graph.add_edge(nodes[from], nodes[to], idx);
        }

        let slack = feeder.slack_index();
        let mut visited = vec![false; buses.len()];
        let mut parent: Vec<Option<usize>> = vec![None; buses.len()];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); buses.len()];
        let mut oriented: Vec<Option<OrientedBranch>> = vec![None; branches.len()];
        let mut order = Vec::with_capacity(buses.len());

        let mut queue = VecDeque::new();
        visited[slack] = true;
        queue.push_back(slack);

        while let Some(bus) = queue.pop_front() {
            order.push(bus);

            let mut incident: Vec<(usize, usize)> = graph
                .edges(nodes[bus])
                .map(|e| {
                    let other = if e.source() == nodes[bus] {
                        e.target()
                    } else {
                        e.source()
                    };
                    (graph[other], *e.weight())
                })
                .filter(|&(_, br)| parent[bus] != Some(br))
                .collect();
            incident.sort_by_key(|&(other, _)| buses[other].id);

            for (other, br) in incident {
                if visited[other] {
                    return Err(CapsiteError::config(
                        branches[br].id.entity(),
                        format!(
                            "branch between buses {} and {} closes a loop; the feeder must be radial",
                            branches[br].from_bus, branches[br].to_bus
                        ),
                    ));
                }
                visited[other] = true;
                parent[other] = Some(br);
                children[bus].push(br);
                oriented[br] = Some(OrientedBranch {
                    branch: br,
                    from: bus,
                    to: other,
                    reversed: branches[br].from_bus != buses[bus].id,
                });
                queue.push_back(other);
            }
        }

        if let Some(stray) = visited.iter().position(|v| !v) {
            let islands = connected_components(&graph);
            return Err(CapsiteError::config(
                buses[stray].id.entity(),
                format!(
                    "bus is not connected to slack bus {} ({} islands found)",
                    buses[slack].id, islands
                ),
            ));
        }

        let oriented = oriented
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                CapsiteError::formulation("network", "branch left unoriented by tree walk")
            })?;

        Ok(Self {
            slack,
            oriented,
            parent,
            children,
            order,
        })
    }

    pub fn slack(&self) -> usize {
        self.slack
    }

    /// Oriented branches, indexed like [`Feeder::branches`]
    pub fn branches(&self) -> &[OrientedBranch] {
        &self.oriented
    }

    pub fn branch(&self, branch: usize) -> &OrientedBranch {
        &self.oriented[branch]
    }

    /// Branch feeding a bus from its parent; `None` at the slack.
    pub fn parent_branch(&self, bus: usize) -> Option<usize> {
        self.parent[bus]
    }

    /// Branches leaving a bus toward its children, ordered by child bus id
    pub fn child_branches(&self, bus: usize) -> &[usize] {
        &self.children[bus]
    }

    /// Bus positions in breadth-first order from the slack
    pub fn bfs_order(&self) -> &[usize] {
        &self.order
    }

    /// Number of branches between a bus and the slack
    pub fn depth(&self, bus: usize) -> usize {
        let mut depth = 0;
        let mut current = bus;
        while let Some(br) = self.parent[current] {
            current = self.oriented[br].from;
            depth += 1;
        }
        depth
    }
}
