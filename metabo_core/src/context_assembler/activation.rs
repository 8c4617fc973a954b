//! Activation state for the spreading activation algorithm.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracks activation energy per node label during spreading.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActivationState {
    energies: HashMap<String, f32>,
}

impl ActivationState {
    /// Create a new empty activation state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add energy to a node (accumulates with existing energy).
    pub fn add_energy(&mut self, label: impl Into<String>, energy: f32) {
        *self.energies.entry(label.into()).or_insert(0.0) += energy;
    }

    pub fn get_energy(&self, label: &str) -> f32 {
        self.energies.get(label).copied().unwrap_or(0.0)
    }

    pub fn is_active(&self, label: &str) -> bool {
        self.get_energy(label) > 0.0
    }

    /// Nodes with energy at or above the threshold, hottest first.
    ///
    /// Ties are broken by label so the order is deterministic.
    pub fn hot_nodes(&self, threshold: f32) -> Vec<(&str, f32)> {
        let mut nodes: Vec<_> = self
            .energies
            .iter()
            .filter(|(_, energy)| **energy >= threshold)
            .map(|(label, energy)| (label.as_str(), *energy))
            .collect();

        nodes.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        nodes
    }

    pub fn hottest_node(&self) -> Option<(&str, f32)> {
        self.hot_nodes(f32::MIN).into_iter().next()
    }

    pub fn total_energy(&self) -> f32 {
        self.energies.values().sum()
    }

    pub fn active_count(&self) -> usize {
        self.energies.len()
    }

    pub fn iter_energies(&self) -> impl Iterator<Item = (&str, f32)> {
        self.energies.iter().map(|(label, energy)| (label.as_str(), *energy))
    }
}
