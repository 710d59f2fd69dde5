//! Registry of active canvas connections.
//!
//! Connections are keyed by a process-unique `u64` handed out by the registry and
//! iterate in creation order, which is the order saved layouts list them in.

use std::collections::BTreeMap;

use super::connection::CanvasConnection;
use super::remote::TransportId;

/// Active connections, keyed by connection key.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<u64, CanvasConnection>,
    next_key: u64,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh key for a connection about to be created.
    pub fn allocate_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }

    /// Register a connection under its own key. Returns the connection previously
    /// registered with that key, if any.
    pub fn register(&mut self, connection: CanvasConnection) -> Option<CanvasConnection> {
        self.next_key = self.next_key.max(connection.key());
        self.connections.insert(connection.key(), connection)
    }

    pub fn get(&self, key: u64) -> Option<&CanvasConnection> {
        self.connections.get(&key)
    }

    pub fn get_mut(&mut self, key: u64) -> Option<&mut CanvasConnection> {
        self.connections.get_mut(&key)
    }

    /// Connection a transport event belongs to.
    pub fn for_transport(&mut self, id: TransportId) -> Option<&mut CanvasConnection> {
        self.connections.get_mut(&id.connection)
    }

    /// Remove a connection, returning it if it existed.
    pub fn remove(&mut self, key: u64) -> Option<CanvasConnection> {
        self.connections.remove(&key)
    }

    /// Remove and return every connection.
    pub fn drain(&mut self) -> Vec<CanvasConnection> {
        std::mem::take(&mut self.connections).into_values().collect()
    }

    /// Keys in creation order.
    pub fn keys(&self) -> Vec<u64> {
        self.connections.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanvasConnection> {
        self.connections.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CanvasConnection> {
        self.connections.values_mut()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(reg: &mut ConnectionRegistry, root: &str) -> u64 {
        let key = reg.allocate_key();
        reg.register(CanvasConnection::new(key, root, None));
        key
    }

    #[test]
    fn test_new_registry_is_empty() {
        let reg = ConnectionRegistry::new();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut reg = ConnectionRegistry::new();
        let key = make_connection(&mut reg, "/canvas/a");
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(key).map(CanvasConnection::root_path), Some("/canvas/a"));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut reg = ConnectionRegistry::new();
        let key = make_connection(&mut reg, "/a");
        let old = reg.register(CanvasConnection::new(key, "/b", None));
        assert_eq!(old.map(|c| c.root_path().to_owned()).as_deref(), Some("/a"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_keys_are_in_creation_order() {
        let mut reg = ConnectionRegistry::new();
        let a = make_connection(&mut reg, "/a");
        let b = make_connection(&mut reg, "/b");
        let c = make_connection(&mut reg, "/c");
        assert_eq!(reg.keys(), vec![a, b, c]);
        reg.remove(b);
        assert_eq!(reg.keys(), vec![a, c]);
    }

    #[test]
    fn test_allocated_keys_skip_registered_ones() {
        let mut reg = ConnectionRegistry::new();
        reg.register(CanvasConnection::new(10, "/x", None));
        assert_eq!(reg.allocate_key(), 11);
    }

    #[test]
    fn test_for_transport_routes_by_connection_key() {
        let mut reg = ConnectionRegistry::new();
        let key = make_connection(&mut reg, "/a");
        let id = TransportId {
            connection: key,
            generation: 4,
        };
        assert!(reg.for_transport(id).is_some());
        let missing = TransportId {
            connection: key + 1,
            generation: 1,
        };
        assert!(reg.for_transport(missing).is_none());
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut reg = ConnectionRegistry::new();
        make_connection(&mut reg, "/a");
        make_connection(&mut reg, "/b");
        assert_eq!(reg.drain().len(), 2);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_remove_missing_returns_none() {
        let mut reg = ConnectionRegistry::new();
        assert!(reg.remove(42).is_none());
    }
}
