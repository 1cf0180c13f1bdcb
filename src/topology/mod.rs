/*! The directed service topology

Nodes are named (abstract servers for output-port descriptions, stations
and switches for physical ones) and identified by their insertion index.
Edges are *turns*: at most one directed turn exists between any ordered
pair of nodes.
*/

use std::collections::HashMap;

use itertools::Itertools;

use crate::error::ModelError;

/// Index of a node in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub usize);

/// Index of a turn in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub usize);

/// A directed edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub from: NodeRef,
    pub to: NodeRef,
}

#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    names: Vec<String>,
    index: HashMap<String, NodeRef>,
    turns: Vec<Turn>,
    successors: Vec<Vec<NodeRef>>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the existing one with the same name.
    pub fn add_node(&mut self, name: &str) -> NodeRef {
        if let Some(node) = self.index.get(name) {
            return *node;
        }
        let node = NodeRef(self.names.len());
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), node);
        self.successors.push(Vec::new());
        node
    }

    pub fn find_node(&self, name: &str) -> Option<NodeRef> {
        self.index.get(name).copied()
    }

    fn lookup(&self, name: &str) -> Result<NodeRef, ModelError> {
        self.find_node(name).ok_or_else(|| ModelError::UnknownNode {
            name: name.to_string(),
        })
    }

    /// `None` if `node` does not belong to this graph.
    pub fn node_name(&self, node: NodeRef) -> Option<&str> {
        self.names.get(node.0).map(String::as_str)
    }

    pub fn node_names(&self) -> &[String] {
        &self.names
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Add the turn `from -> to` between two known nodes.
    pub fn add_turn(&mut self, from: &str, to: &str) -> Result<Turn, ModelError> {
        let (f, t) = (self.lookup(from)?, self.lookup(to)?);
        if self.successors[f.0].contains(&t) {
            return Err(ModelError::DuplicateTurn {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(self.push_turn(f, t))
    }

    /// Like [TopologyGraph::add_turn], but an existing turn is returned
    /// instead of being reported as a duplicate.
    pub fn ensure_turn(&mut self, from: &str, to: &str) -> Result<Turn, ModelError> {
        match self.add_turn(from, to) {
            Err(ModelError::DuplicateTurn { .. }) => self.resolve_turn(from, to),
            other => other,
        }
    }

    fn push_turn(&mut self, from: NodeRef, to: NodeRef) -> Turn {
        let turn = Turn {
            id: TurnId(self.turns.len()),
            from,
            to,
        };
        self.turns.push(turn);
        self.successors[from.0].push(to);
        turn
    }

    /// Look up the unique turn `from -> to`.
    pub fn resolve_turn(&self, from: &str, to: &str) -> Result<Turn, ModelError> {
        let (f, t) = (self.lookup(from)?, self.lookup(to)?);
        let candidates = self
            .turns
            .iter()
            .filter(|turn| turn.from == f && turn.to == t)
            .collect_vec();
        match candidates.as_slice() {
            [turn] => Ok(**turn),
            [] => Err(ModelError::NoSuchTurn {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(ModelError::AmbiguousPath {
                from: from.to_string(),
                to: to.to_string(),
                count: candidates.len(),
            }),
        }
    }

    /// Whether some node can reach itself.
    pub fn has_cycle(&self) -> bool {
        let mut color = vec![Color::White; self.node_count()];
        for root in 0..self.node_count() {
            if color[root] != Color::White {
                continue;
            }
            // iterative DFS; each frame is (node, next successor to visit)
            let mut stack = vec![(root, 0)];
            color[root] = Color::Grey;
            while let Some((node, next)) = stack.pop() {
                match self.successors[node].get(next) {
                    Some(succ) => {
                        stack.push((node, next + 1));
                        match color[succ.0] {
                            Color::Grey => return true,
                            Color::White => {
                                color[succ.0] = Color::Grey;
                                stack.push((succ.0, 0));
                            }
                            Color::Black => (),
                        }
                    }
                    None => color[node] = Color::Black,
                }
            }
        }
        false
    }

    /// Square matrix in node insertion order; `m[i][j] == 1` iff the turn
    /// `i -> j` exists.
    pub fn adjacency_matrix(&self) -> Vec<Vec<u8>> {
        let n = self.node_count();
        let mut matrix = vec![vec![0; n]; n];
        for turn in &self.turns {
            matrix[turn.from.0][turn.to.0] = 1;
        }
        matrix
    }

    #[cfg(test)]
    pub(crate) fn push_unchecked(&mut self, from: &str, to: &str) -> Result<Turn, ModelError> {
        let (f, t) = (self.lookup(from)?, self.lookup(to)?);
        Ok(self.push_turn(f, t))
    }
}

#[cfg(test)]
mod tests;
