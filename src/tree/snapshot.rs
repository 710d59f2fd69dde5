//! Serializable copies of a property subtree.
//!
//! Snapshots are stored in saved layouts so a canvas can be shown again without a
//! live connection.

use serde::{Deserialize, Serialize};

use super::{NodeId, PropValue, PropertyTree, TreeObserver};
use crate::error::Result;

/// Recursive `{name, index, value, children}` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default, skip_serializing_if = "PropValue::is_none")]
    pub value: PropValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PropertySnapshot>,
}

impl PropertyTree {
    /// Capture `id` and everything below it.
    pub fn snapshot(&self, id: NodeId) -> Option<PropertySnapshot> {
        let node = self.get(id)?;
        Some(PropertySnapshot {
            name: node.name().to_owned(),
            index: node.index(),
            value: node.value().clone(),
            children: node
                .children()
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect(),
        })
    }

    /// Recreate the children (and value) of `snapshot` below `target`.
    ///
    /// The snapshot's own name/index are ignored so a root snapshot can be restored
    /// onto any node. Notifications fire exactly as for live creation.
    pub fn restore_snapshot(
        &mut self,
        target: NodeId,
        snapshot: &PropertySnapshot,
        observer: &mut dyn TreeObserver,
    ) -> Result<()> {
        self.set_value(target, snapshot.value.clone(), observer)?;
        for child in &snapshot.children {
            let node = self.get_or_create_child(target, &child.name, child.index, observer)?;
            self.restore_snapshot(node, child, observer)?;
        }
        Ok(())
    }
}
