//! Parent/child reconstruction over a flat message list.
//!
//! The tree borrows the messages it indexes and stores adjacency by position,
//! so repairing a malformed graph (orphans, cycles) only moves indices between
//! lists. After [`build_tree`] returns, every node has exactly one place in
//! the tree: it is either a root or the child of exactly one parent, and
//! following children from the roots always terminates.

use crate::entry::Message;
use crate::validate::Finding;
use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;

#[derive(Debug, Clone)]
pub struct ConversationTree<'a> {
    /// First occurrence of each uuid, in file order.
    nodes: Vec<&'a Message>,
    index: HashMap<&'a str, usize>,
    /// Effective parent after orphan and cycle handling.
    parents: Vec<Option<usize>>,
    /// Children in file order.
    children: Vec<Vec<usize>>,
    /// Declared roots, orphans and cycle-broken nodes, in file order.
    roots: Vec<usize>,
    orphans: Vec<usize>,
    findings: Vec<Finding>,
}

/// Build the forest for `messages`.
///
/// Duplicate uuids keep their first occurrence; the rest are left out of the
/// tree (the validator reports them). A parent reference that resolves nowhere
/// turns the message into an extra root. A cycle is cut at its earliest
/// member in file order, which becomes a root and is recorded as
/// [`Finding::CycleBroken`].
pub fn build_tree(messages: &[Message]) -> ConversationTree<'_> {
    let mut nodes: Vec<&Message> = Vec::with_capacity(messages.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(messages.len());
    for message in messages {
        match index.entry(message.uuid()) {
            MapEntry::Vacant(slot) => {
                slot.insert(nodes.len());
                nodes.push(message);
            }
            MapEntry::Occupied(_) => {
                tracing::debug!(
                    uuid = message.uuid(),
                    line = message.line_number(),
                    "Duplicate uuid left out of tree"
                );
            }
        }
    }

    let mut parents: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    let mut orphans = Vec::new();

    for (i, node) in nodes.iter().enumerate() {
        match node.parent_uuid() {
            None => roots.push(i),
            Some(parent) => match index.get(parent) {
                Some(&p) => {
                    parents[i] = Some(p);
                    children[p].push(i);
                }
                None => {
                    orphans.push(i);
                    roots.push(i);
                }
            },
        }
    }

    let mut tree = ConversationTree {
        nodes,
        index,
        parents,
        children,
        roots,
        orphans,
        findings: Vec::new(),
    };
    tree.break_cycles();
    tree
}

impl<'a> ConversationTree<'a> {
    /// Every node not reachable from a root sits on, or below, a cycle: each
    /// node has at most one parent, so no path from a root can enter one.
    fn break_cycles(&mut self) {
        let mut visited = vec![false; self.nodes.len()];
        for &root in &self.roots {
            self.mark_reachable(root, &mut visited);
        }

        let mut on_path = vec![false; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if visited[start] {
                continue;
            }

            let mut path = Vec::new();
            let mut current = start;
            let entry = loop {
                if on_path[current] {
                    break Some(current);
                }
                on_path[current] = true;
                path.push(current);
                match self.parents[current] {
                    Some(parent) => current = parent,
                    None => break None,
                }
            };
            for &node in &path {
                on_path[node] = false;
            }

            let Some(cycle_start) = entry.and_then(|e| path.iter().position(|&node| node == e))
            else {
                continue;
            };
            let Some(&cut) = path[cycle_start..].iter().min() else {
                continue;
            };
            self.detach(cut);
            self.mark_reachable(cut, &mut visited);
        }
    }

    fn detach(&mut self, node: usize) {
        let Some(parent) = self.parents[node].take() else {
            return;
        };
        self.children[parent].retain(|&child| child != node);
        if let Err(pos) = self.roots.binary_search(&node) {
            self.roots.insert(pos, node);
        }

        let uuid = self.nodes[node].uuid();
        let parent_uuid = self.nodes[parent].uuid();
        tracing::warn!(uuid, parent_uuid, "Parent cycle broken");
        self.findings.push(Finding::CycleBroken {
            uuid: uuid.to_string(),
            parent_uuid: parent_uuid.to_string(),
        });
    }

    fn mark_reachable(&self, from: usize, visited: &mut [bool]) {
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            stack.extend(self.children[node].iter().copied());
        }
    }

    fn position(&self, uuid: &str) -> Option<usize> {
        self.index.get(uuid).copied()
    }

    fn uuid_at(&self, position: usize) -> &'a str {
        self.nodes[position].uuid()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.index.contains_key(uuid)
    }

    pub fn get(&self, uuid: &str) -> Option<&'a Message> {
        self.position(uuid).map(|i| self.nodes[i])
    }

    /// Nodes in file order.
    pub fn messages(&self) -> impl Iterator<Item = &'a Message> + '_ {
        self.nodes.iter().copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.roots.iter().map(|&i| self.uuid_at(i))
    }

    /// Nodes whose parent reference did not resolve.
    pub fn orphans(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.orphans.iter().map(|&i| self.uuid_at(i))
    }

    /// Children of `uuid` in file order; empty for unknown uuids.
    pub fn children(&self, uuid: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.position(uuid)
            .map(|i| self.children[i].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&c| self.uuid_at(c))
    }

    pub fn child_count(&self, uuid: &str) -> usize {
        self.position(uuid).map_or(0, |i| self.children[i].len())
    }

    /// Effective parent: `None` for roots, orphans and cycle-broken nodes.
    pub fn parent(&self, uuid: &str) -> Option<&'a str> {
        let i = self.position(uuid)?;
        self.parents[i].map(|p| self.uuid_at(p))
    }

    pub fn is_leaf(&self, uuid: &str) -> bool {
        self.position(uuid)
            .is_some_and(|i| self.children[i].is_empty())
    }

    /// Leaves in file order.
    pub fn leaves(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.nodes.len())
            .filter(|&i| self.children[i].is_empty())
            .map(|i| self.uuid_at(i))
    }

    /// Cycle breaks made while building.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Pre-order walk over every root in order.
    pub fn depth_first(&self) -> DepthFirst<'_, 'a> {
        DepthFirst {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Pre-order walk of the subtree at `uuid`, starting with `uuid` itself.
    /// Empty for unknown uuids.
    pub fn depth_first_from(&self, uuid: &str) -> DepthFirst<'_, 'a> {
        DepthFirst {
            tree: self,
            stack: self.position(uuid).into_iter().collect(),
        }
    }

    /// Ancestors of `uuid`, root first, excluding `uuid`.
    pub fn ancestors(&self, uuid: &str) -> Option<Vec<&'a str>> {
        let mut path = self.path_to(uuid)?;
        path.pop();
        Some(path)
    }

    /// The chain from the root down to `uuid`, both included.
    pub fn path_to(&self, uuid: &str) -> Option<Vec<&'a str>> {
        let mut current = self.position(uuid)?;
        let mut path = vec![self.uuid_at(current)];
        while let Some(parent) = self.parents[current] {
            path.push(self.uuid_at(parent));
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Number of edges between `uuid` and its root.
    pub fn depth(&self, uuid: &str) -> Option<usize> {
        self.ancestors(uuid).map(|a| a.len())
    }

    /// Nodes strictly below `uuid`.
    pub fn descendant_count(&self, uuid: &str) -> usize {
        self.depth_first_from(uuid).count().saturating_sub(1)
    }

    /// Look up messages for a uuid sequence, skipping unknown ones.
    pub fn resolve(&self, uuids: &[&str]) -> Vec<&'a Message> {
        uuids.iter().filter_map(|uuid| self.get(uuid)).collect()
    }
}

/// Lazy pre-order traversal. Clone it to restart from the same point.
#[derive(Debug, Clone)]
pub struct DepthFirst<'t, 'a> {
    tree: &'t ConversationTree<'a>,
    stack: Vec<usize>,
}

impl<'a> Iterator for DepthFirst<'_, 'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.tree.children[node].iter().rev().copied());
        Some(self.tree.uuid_at(node))
    }
}
