//! Chain graph between controllers.
//!
//! Controllers are chained through interface names: an interface whose
//! prefix names another loaded controller is a chained interface. Consuming
//! one through the command configuration makes the exporter a *following*
//! controller (the consumer writes into its references before it runs);
//! consuming one through the state configuration inverts the direction,
//! because state flows opposite to commands.
//!
//! The graph drives two things: the stable update order of the roster
//! (preceding controllers run before their followers in every cycle) and
//! the switch engine's chained-mode bookkeeping.

use std::collections::{HashMap, VecDeque};

/// Deduplicating push, mirrors the list semantics used throughout the
/// switch engine.
pub(crate) fn add_item(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

pub(crate) fn remove_item(list: &mut Vec<String>, item: &str) -> bool {
    match list.iter().position(|existing| existing == item) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Default)]
struct ChainSpec {
    /// Controllers whose exported interfaces this one writes or reads;
    /// they must run after this controller.
    following: Vec<String>,
    /// Controllers that must run before this one.
    preceding: Vec<String>,
}

/// Bidirectional adjacency between controllers plus the derived update
/// order.
#[derive(Debug, Default)]
pub struct ChainGraph {
    specs: HashMap<String, ChainSpec>,
    /// Load order; breaks ordering ties deterministically
    insertion_order: Vec<String>,
    /// Consumers of a controller's reference interfaces, keyed by exporter
    reference_consumers: HashMap<String, Vec<String>>,
    /// Consumers of a controller's exported state interfaces
    state_consumers: HashMap<String, Vec<String>>,
    /// Topologically ordered controller names, preceders first
    ordered: Vec<String>,
}

impl ChainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly loaded controller with no edges yet.
    pub fn add_controller(&mut self, name: &str) {
        self.specs.entry(name.to_string()).or_default();
        self.reference_consumers.entry(name.to_string()).or_default();
        self.state_consumers.entry(name.to_string()).or_default();
        add_item(&mut self.insertion_order, name);
    }

    /// Unlink a controller from every edge and drop it from the graph.
    pub fn remove_controller(&mut self, name: &str) {
        let spec = self.specs.remove(name).unwrap_or_default();
        for following in &spec.following {
            if let Some(other) = self.specs.get_mut(following) {
                remove_item(&mut other.preceding, name);
            }
        }
        for preceding in &spec.preceding {
            if let Some(other) = self.specs.get_mut(preceding) {
                remove_item(&mut other.following, name);
            }
        }
        for consumers in self.reference_consumers.values_mut() {
            remove_item(consumers, name);
        }
        for consumers in self.state_consumers.values_mut() {
            remove_item(consumers, name);
        }
        self.reference_consumers.remove(name);
        self.state_consumers.remove(name);
        remove_item(&mut self.insertion_order, name);
        remove_item(&mut self.ordered, name);
    }

    /// Record the chain edges implied by a controller's interface
    /// configurations. Called on configure; repeated calls deduplicate.
    pub fn note_dependencies(
        &mut self,
        name: &str,
        command_interfaces: &[String],
        state_interfaces: &[String],
    ) {
        for interface in command_interfaces {
            if let Some(exporter) = self.chained_prefix(name, interface) {
                let spec = self.specs.entry(name.to_string()).or_default();
                add_item(&mut spec.following, &exporter);
                let other = self.specs.entry(exporter.clone()).or_default();
                add_item(&mut other.preceding, name);
                add_item(
                    self.reference_consumers.entry(exporter).or_default(),
                    name,
                );
            }
        }
        for interface in state_interfaces {
            if let Some(exporter) = self.chained_prefix(name, interface) {
                let spec = self.specs.entry(name.to_string()).or_default();
                add_item(&mut spec.preceding, &exporter);
                let other = self.specs.entry(exporter.clone()).or_default();
                add_item(&mut other.following, name);
                add_item(self.state_consumers.entry(exporter).or_default(), name);
            }
        }
    }

    /// The exporter name if `interface` is a chained interface of another
    /// loaded controller.
    fn chained_prefix(&self, own_name: &str, interface: &str) -> Option<String> {
        let prefix = crate::hardware::interface_prefix(interface)?;
        if prefix != own_name && self.specs.contains_key(prefix) {
            Some(prefix.to_string())
        } else {
            None
        }
    }

    /// Controllers this one must run before (its exporters).
    pub fn following_of(&self, name: &str) -> Vec<String> {
        self.specs
            .get(name)
            .map(|spec| spec.following.clone())
            .unwrap_or_default()
    }

    /// Controllers that must run before this one.
    pub fn preceding_of(&self, name: &str) -> Vec<String> {
        self.specs
            .get(name)
            .map(|spec| spec.preceding.clone())
            .unwrap_or_default()
    }

    /// Every controller that consumes one of `name`'s exported reference or
    /// state interfaces.
    pub fn consumers_of(&self, name: &str) -> Vec<String> {
        let mut consumers = self
            .reference_consumers
            .get(name)
            .cloned()
            .unwrap_or_default();
        if let Some(state) = self.state_consumers.get(name) {
            for consumer in state {
                add_item(&mut consumers, consumer);
            }
        }
        consumers
    }

    /// Consumers of `name`'s reference interfaces only.
    pub fn reference_consumers_of(&self, name: &str) -> Vec<String> {
        self.reference_consumers
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the graph currently contains a cycle. Kahn's algorithm: if a
    /// full topological pass cannot place every controller, some subset is
    /// cyclic.
    pub fn has_cycles(&self) -> bool {
        let mut in_degree: HashMap<&str, usize> =
            self.specs.keys().map(|name| (name.as_str(), 0)).collect();
        for spec in self.specs.values() {
            for following in &spec.following {
                if let Some(degree) = in_degree.get_mut(following.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut placed = 0usize;

        while let Some(name) = queue.pop_front() {
            placed += 1;
            if let Some(spec) = self.specs.get(name) {
                for following in &spec.following {
                    if let Some(degree) = in_degree.get_mut(following.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(following.as_str());
                        }
                    }
                }
            }
        }

        placed != self.specs.len()
    }

    /// Rebuild the ordered name list by the stable chain walk: every
    /// controller is placed before its known followers and after its known
    /// preceders; ties keep load order.
    pub fn rebuild_order(&mut self) {
        self.ordered.clear();
        let names = self.insertion_order.clone();
        for name in names {
            if !self.ordered.iter().any(|n| *n == name) {
                let end = self.ordered.len();
                self.insert_with_chain(&name, end, false);
            }
        }
    }

    /// The current update order, preceders first.
    pub fn ordered_names(&self) -> &[String] {
        &self.ordered
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.ordered.iter().position(|n| n == name)
    }

    fn insert_with_chain(&mut self, name: &str, position: usize, append: bool) {
        if self.index_of(name).is_some() {
            return;
        }
        let spec = self.specs.get(name).cloned().unwrap_or_default();

        let mut pos = position.min(self.ordered.len());
        for following in &spec.following {
            if let Some(index) = self.index_of(following) {
                if index < pos {
                    pos = index;
                }
            }
        }
        for preceding in &spec.preceding {
            if let Some(index) = self.index_of(preceding) {
                if index > pos {
                    pos = index;
                }
            }
        }

        let insert_at = if append {
            (pos + 1).min(self.ordered.len())
        } else {
            pos
        };
        self.ordered.insert(insert_at, name.to_string());

        for following in &spec.following {
            if let Some(anchor) = self.index_of(name) {
                self.insert_with_chain(following, anchor, true);
            }
        }
        for preceding in &spec.preceding {
            if let Some(anchor) = self.index_of(name) {
                self.insert_with_chain(preceding, anchor, false);
            }
        }
    }
}
