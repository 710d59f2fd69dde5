//! Remote mirror session.
//!
//! [`MirrorSession`] owns the local property tree for one mirrored root path and
//! the table mapping remote property ids onto local nodes. It knows nothing about
//! sockets: the transport feeds it text frames through
//! [`apply_message`](MirrorSession::apply_message), which runs to completion before
//! the next frame is looked at.

use std::collections::{HashMap, HashSet};

use super::protocol::{RemoteId, UpdateEnvelope};
use super::status::ConnectionStatus;
use crate::error::Result;
use crate::tree::path::{normalize_root_path, strip_root};
use crate::tree::snapshot::PropertySnapshot;
use crate::tree::{NodeId, PropValue, PropertyTree, TreeObserver};

/// Which section of an update an id was referenced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Remove,
    Change,
}

impl std::fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remove => write!(f, "remove"),
            Self::Change => write!(f, "change"),
        }
    }
}

/// A recoverable problem with a single update entry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolWarning {
    #[error("not a property path we are mirroring: {path}")]
    OutsideRoot { path: String },

    #[error("invalid property path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("duplicate add of id {id} at {path}, previously {previous}")]
    DuplicateId {
        id: RemoteId,
        path: String,
        previous: String,
    },

    #[error("ignoring {op} of unknown property id {id}")]
    UnknownId { id: RemoteId, op: UpdateOp },

    #[error("refusing to remove the mirrored root (id {id})")]
    RootRemoval { id: RemoteId },

    #[error("malformed {section} entry: {detail}")]
    MalformedEntry {
        section: &'static str,
        detail: String,
    },
}

/// Outcome of applying one update message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub created: usize,
    pub removed: usize,
    pub changed: usize,
    pub warnings: Vec<ProtocolWarning>,
}

impl ApplyReport {
    fn warn(&mut self, warning: ProtocolWarning) {
        tracing::warn!(%warning, "skipping update entry");
        self.warnings.push(warning);
    }
}

/// Local mirror of one remote property subtree.
pub struct MirrorSession {
    root_path: String,
    status: ConnectionStatus,
    tree: PropertyTree,
    ids: HashMap<RemoteId, NodeId>,
    last_error: Option<String>,
    warning_count: usize,
}

impl MirrorSession {
    /// Create an idle session mirroring `root_path` (normalized).
    pub fn new(root_path: &str) -> Self {
        Self {
            root_path: normalize_root_path(root_path),
            status: ConnectionStatus::Idle,
            tree: PropertyTree::new(),
            ids: HashMap::new(),
            last_error: None,
            warning_count: 0,
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Change the mirrored root. Only meaningful before the next connect.
    pub fn set_root_path(&mut self, root_path: &str) {
        self.root_path = normalize_root_path(root_path);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn tree(&self) -> &PropertyTree {
        &self.tree
    }

    /// Property node currently aliased by a remote id.
    pub fn node_for_id(&self, id: RemoteId) -> Option<NodeId> {
        self.ids.get(&id).copied()
    }

    /// Number of ids in the alias table.
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    /// Reason of the last transport failure, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Total protocol warnings recorded over the session's lifetime.
    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    fn transition(&mut self, next: ConnectionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(from = %self.status, to = %next, "ignoring invalid status transition");
            return false;
        }
        if self.status != next {
            tracing::info!(root = %self.root_path, from = %self.status, to = %next, "mirror status changed");
        }
        self.status = next;
        true
    }

    /// Enter `Connecting`.
    pub fn begin_connecting(&mut self) -> bool {
        self.last_error = None;
        self.transition(ConnectionStatus::Connecting)
    }

    /// Enter `Connected`. Remote ids are not stable across connections, so the id
    /// table and the previous subtree are discarded before updates arrive.
    pub fn enter_connected(&mut self, observer: &mut dyn TreeObserver) -> bool {
        if !self.transition(ConnectionStatus::Connected) {
            return false;
        }
        self.discard(observer);
        true
    }

    /// Enter `Snapshot`, rebuilding the tree from a saved snapshot.
    pub fn enter_snapshot(
        &mut self,
        snapshot: &PropertySnapshot,
        observer: &mut dyn TreeObserver,
    ) -> Result<bool> {
        if !self.transition(ConnectionStatus::Snapshot) {
            return Ok(false);
        }
        self.discard(observer);
        let root = self.tree.root();
        self.tree.restore_snapshot(root, snapshot, observer)?;
        Ok(true)
    }

    /// Record a transport-level close or failure. The stale tree is kept for
    /// display until the next `Connected` discards it.
    pub fn mark_disconnected(&mut self, reason: Option<String>) {
        if let Some(reason) = &reason {
            tracing::warn!(root = %self.root_path, %reason, "mirror connection lost");
        }
        self.last_error = reason;
        self.transition(ConnectionStatus::Disconnected);
    }

    /// Explicit close: invalidate every id and destroy the subtree.
    pub fn close(&mut self, observer: &mut dyn TreeObserver) {
        self.discard(observer);
        self.transition(ConnectionStatus::Disconnected);
    }

    fn discard(&mut self, observer: &mut dyn TreeObserver) {
        self.ids.clear();
        self.tree.reset(observer);
    }

    /// Capture the current tree.
    pub fn snapshot(&self) -> Option<PropertySnapshot> {
        self.tree.snapshot(self.tree.root())
    }

    /// Decode and apply one text frame.
    ///
    /// Returns an error only when the frame is not an update object at all; in
    /// that case nothing is applied.
    pub fn apply_message(
        &mut self,
        text: &str,
        observer: &mut dyn TreeObserver,
    ) -> Result<ApplyReport> {
        let envelope = UpdateEnvelope::decode(text)?;
        Ok(self.apply_envelope(&envelope, observer))
    }

    /// Apply a decoded update: created, then removed, then changed.
    pub fn apply_envelope(
        &mut self,
        envelope: &UpdateEnvelope,
        observer: &mut dyn TreeObserver,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        for bad in &envelope.malformed {
            report.warn(ProtocolWarning::MalformedEntry {
                section: bad.section,
                detail: bad.detail.clone(),
            });
        }

        for entry in &envelope.created {
            let Some(local) = strip_root(&self.root_path, &entry.path) else {
                report.warn(ProtocolWarning::OutsideRoot {
                    path: entry.path.clone(),
                });
                continue;
            };

            let root = self.tree.root();
            let node = match self.tree.resolve_path(root, local, observer) {
                Ok(node) => node,
                Err(e) => {
                    report.warn(ProtocolWarning::InvalidPath {
                        path: entry.path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            // The stale node, if any, stays reachable through its parent.
            if let Some(previous) = self.ids.insert(entry.id, node)
                && previous != node
            {
                let previous = if self.tree.contains(previous) {
                    self.tree.path(previous)
                } else {
                    "<removed>".to_owned()
                };
                report.warn(ProtocolWarning::DuplicateId {
                    id: entry.id,
                    path: entry.path.clone(),
                    previous,
                });
            }

            if let Err(e) = self
                .tree
                .set_value(node, PropValue::from_json(&entry.value), observer)
            {
                tracing::debug!(error = %e, path = %entry.path, "initial value not applied");
            }
            report.created += 1;
        }

        for &id in &envelope.removed {
            let Some(node) = self.ids.get(&id).copied() else {
                report.warn(ProtocolWarning::UnknownId {
                    id,
                    op: UpdateOp::Remove,
                });
                continue;
            };
            if node == self.tree.root() {
                report.warn(ProtocolWarning::RootRemoval { id });
                continue;
            }

            match self.tree.remove_node(node, observer) {
                Ok(destroyed) => {
                    let destroyed: HashSet<NodeId> = destroyed.into_iter().collect();
                    self.ids.retain(|_, n| !destroyed.contains(n));
                    report.removed += 1;
                }
                Err(_) => {
                    self.ids.remove(&id);
                    report.warn(ProtocolWarning::UnknownId {
                        id,
                        op: UpdateOp::Remove,
                    });
                }
            }
        }

        for change in &envelope.changed {
            let Some(node) = self.ids.get(&change.id).copied() else {
                report.warn(ProtocolWarning::UnknownId {
                    id: change.id,
                    op: UpdateOp::Change,
                });
                continue;
            };
            match self.tree.set_value(node, change.value.clone(), observer) {
                Ok(_) => report.changed += 1,
                Err(_) => {
                    self.ids.remove(&change.id);
                    report.warn(ProtocolWarning::UnknownId {
                        id: change.id,
                        op: UpdateOp::Change,
                    });
                }
            }
        }

        self.warning_count += report.warnings.len();
        tracing::debug!(
            created = report.created,
            removed = report.removed,
            changed = report.changed,
            warnings = report.warnings.len(),
            "applied mirror update"
        );
        report
    }
}

impl std::fmt::Debug for MirrorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorSession")
            .field("root_path", &self.root_path)
            .field("status", &self.status)
            .field("nodes", &self.tree.len())
            .field("ids", &self.ids.len())
            .finish()
    }
}
