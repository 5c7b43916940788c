//! Connection registry for WebSocket clients
//!
//! Tracks live connections, their symbol subscriptions, the per-user index
//! and the last broadcast price per symbol. Every mutation is a single map
//! operation; nothing here awaits, so callers never hold a shard lock across
//! a suspension point.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use ticker_core::{ConnectionStats, PriceQuote, ServerMessage, Symbol, SymbolPriceState};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Capacity of each connection's outbound queue
pub const OUTBOUND_BUFFER: usize = 100;

/// Handle used to push messages towards one client's socket writer
pub type Outbound = mpsc::Sender<ServerMessage>;

/// Unique identifier for a WebSocket client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One live client session
#[derive(Debug)]
struct Connection {
    outbound: Outbound,
    subscriptions: HashSet<Symbol>,
    user_id: Option<String>,
}

/// Result of pushing one message onto an outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    /// Queue full; the message was dropped but the client is still alive
    Dropped,
    /// Writer side is gone; the connection must be removed
    Closed,
}

fn deliver(id: ConnectionId, outbound: &Outbound, message: ServerMessage) -> Delivery {
    match outbound.try_send(message) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(message)) => {
            warn!(
                "Outbound queue full for {}, dropping {} message",
                id,
                message.kind()
            );
            Delivery::Dropped
        }
        Err(TrySendError::Closed(message)) => {
            warn!("Error sending {} message to {}: connection closed", message.kind(), id);
            Delivery::Closed
        }
    }
}

/// Registry of live connections, subscriptions and last-known prices
pub struct ConnectionRegistry {
    /// Next connection ID to assign
    next_connection_id: AtomicU64,
    /// Map of connection ID -> connection
    connections: DashMap<ConnectionId, Connection>,
    /// Map of user ID -> connections opened by that user
    user_connections: DashMap<String, HashSet<ConnectionId>>,
    /// Last broadcast snapshot per symbol
    last_prices: DashMap<Symbol, SymbolPriceState>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_connection_id: AtomicU64::new(1),
            connections: DashMap::new(),
            user_connections: DashMap::new(),
            last_prices: DashMap::new(),
        }
    }

    /// Register a connection and send it the connection acknowledgement
    pub fn connect(&self, outbound: Outbound, user_id: Option<String>) -> ConnectionId {
        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst));

        if let Some(ref user) = user_id {
            self.user_connections
                .entry(user.clone())
                .or_default()
                .insert(id);
        }

        self.connections.insert(
            id,
            Connection {
                outbound,
                subscriptions: HashSet::new(),
                user_id,
            },
        );

        self.send_to_one(id, ServerMessage::connection_established());

        info!(
            "WebSocket connection {} established. Total connections: {}",
            id,
            self.connections.len()
        );
        id
    }

    /// Remove a connection; returns whether it was registered
    ///
    /// Calling this for an unknown or already removed connection is a no-op.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let Some((_, connection)) = self.connections.remove(&id) else {
            return false;
        };

        if let Some(user) = connection.user_id {
            if let Some(mut ids) = self.user_connections.get_mut(&user) {
                ids.remove(&id);
            }
            self.user_connections.remove_if(&user, |_, ids| ids.is_empty());
        }

        info!(
            "WebSocket connection {} closed. Total connections: {}",
            id,
            self.connections.len()
        );
        true
    }

    /// Send a message to one connection
    ///
    /// A closed connection is removed from the registry. Returns whether the
    /// message was queued.
    pub fn send_to_one(&self, id: ConnectionId, message: ServerMessage) -> bool {
        let Some(outbound) = self.connections.get(&id).map(|c| c.outbound.clone()) else {
            debug!("Dropping {} message for unknown {}", message.kind(), id);
            return false;
        };

        match deliver(id, &outbound, message) {
            Delivery::Delivered => true,
            Delivery::Dropped => false,
            Delivery::Closed => {
                self.disconnect(id);
                false
            }
        }
    }

    /// Broadcast a message to every connected client
    ///
    /// Delivery does not depend on subscriptions. The message is stamped with
    /// the current time; connections that turn out to be closed are removed
    /// after the fan-out pass. Returns the number of clients reached.
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        let targets: Vec<(ConnectionId, Outbound)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().outbound.clone()))
            .collect();

        if targets.is_empty() {
            return 0;
        }

        let message = message.with_timestamp(Utc::now());
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, outbound) in &targets {
            match deliver(*id, outbound, message.clone()) {
                Delivery::Delivered => delivered += 1,
                Delivery::Dropped => {}
                Delivery::Closed => closed.push(*id),
            }
        }

        for id in closed {
            self.disconnect(id);
        }

        delivered
    }

    /// Send a message to every connection opened by a user
    pub fn send_to_user(&self, user_id: &str, message: ServerMessage) -> usize {
        let ids: Vec<ConnectionId> = self
            .user_connections
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        ids.into_iter()
            .filter(|id| self.send_to_one(*id, message.clone()))
            .count()
    }

    /// Subscribe a connection to a symbol
    ///
    /// If a price is already cached for the symbol it is pushed immediately,
    /// ahead of the confirmation. Returns `false` for unknown connections.
    pub fn subscribe(&self, id: ConnectionId, symbol: Symbol) -> bool {
        let newly_added = match self.connections.get_mut(&id) {
            Some(mut connection) => connection.subscriptions.insert(symbol.clone()),
            None => {
                debug!("Ignoring subscribe to {} from unknown {}", symbol, id);
                return false;
            }
        };

        if let Some(state) = self.cached_price(&symbol) {
            self.send_to_one(id, ServerMessage::price_update(state));
        }

        self.send_to_one(id, ServerMessage::subscription_confirmed(symbol.clone()));

        if newly_added {
            info!("{} subscribed to {}", id, symbol);
        } else {
            debug!("{} re-subscribed to {}", id, symbol);
        }
        true
    }

    /// Fold a fresh quote into the price cache and return the new state
    ///
    /// The previous state is read and replaced under the same entry guard.
    pub fn record_price(&self, quote: PriceQuote) -> SymbolPriceState {
        match self.last_prices.entry(quote.symbol.clone()) {
            Entry::Occupied(mut entry) => {
                let next = SymbolPriceState::from_quote(quote, Some(entry.get()));
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                let next = SymbolPriceState::from_quote(quote, None);
                entry.insert(next.clone());
                next
            }
        }
    }

    /// Last broadcast state for a symbol
    pub fn cached_price(&self, symbol: &Symbol) -> Option<SymbolPriceState> {
        self.last_prices.get(symbol).map(|state| state.clone())
    }

    /// Symbols a connection is subscribed to
    pub fn subscriptions_of(&self, id: ConnectionId) -> Option<HashSet<Symbol>> {
        self.connections
            .get(&id)
            .map(|connection| connection.subscriptions.clone())
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Get total number of connected clients
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get number of distinct users with at least one connection
    pub fn user_count(&self) -> usize {
        self.user_connections.len()
    }

    /// Get number of connections opened by a user
    pub fn user_connection_count(&self, user_id: &str) -> usize {
        self.user_connections
            .get(user_id)
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    pub fn cached_symbol_count(&self) -> usize {
        self.last_prices.len()
    }

    /// Snapshot of registry statistics
    pub fn stats(&self, is_running: bool) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.connection_count(),
            is_running,
            total_users: self.user_count(),
            cached_symbols: self.cached_symbol_count(),
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("total_connections", &self.connection_count())
            .field("total_users", &self.user_count())
            .field("cached_symbols", &self.cached_symbol_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use ticker_core::{DataSource, ErrorCode};
    use tokio::sync::mpsc::error::TryRecvError;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn quote(raw: &str, price: f64) -> PriceQuote {
        PriceQuote {
            symbol: symbol(raw),
            price,
            volume: 10.0,
            previous_close: None,
            source: DataSource::Yahoo,
            timestamp: Utc::now(),
        }
    }

    /// Register a client and swallow its connection acknowledgement
    fn connect(
        registry: &ConnectionRegistry,
        user: Option<&str>,
    ) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
        let id = registry.connect(tx, user.map(str::to_string));
        match rx.try_recv() {
            Ok(ServerMessage::ConnectionEstablished { .. }) => {}
            other => panic!("expected connection_established, got {:?}", other),
        }
        (id, rx)
    }

    #[test]
    fn test_connect_sends_acknowledgement() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
        let id = registry.connect(tx, None);

        assert!(registry.is_connected(id));
        assert_eq!(registry.connection_count(), 1);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::ConnectionEstablished { .. })
        ));
        assert_eq!(registry.subscriptions_of(id), Some(HashSet::new()));
    }

    #[test]
    fn test_connect_with_closed_queue_disconnects_immediately() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        drop(rx);

        let id = registry.connect(tx, Some("alice".to_string()));

        assert!(!registry.is_connected(id));
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.user_count(), 0);
        assert_eq!(registry.user_connection_count("alice"), 0);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = connect(&registry, None);
        let (_b, _rx_b) = connect(&registry, None);

        assert!(registry.disconnect(a));
        assert_eq!(registry.connection_count(), 1);

        assert!(!registry.disconnect(a));
        assert!(!registry.disconnect(ConnectionId(9_999)));
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn test_user_index_supports_multiple_connections() {
        let registry = ConnectionRegistry::new();
        let (first, mut rx_first) = connect(&registry, Some("alice"));
        let (second, mut rx_second) = connect(&registry, Some("alice"));
        let (_other, mut rx_other) = connect(&registry, Some("bob"));

        assert_eq!(registry.user_count(), 2);
        assert_eq!(registry.user_connection_count("alice"), 2);

        let reached = registry.send_to_user("alice", ServerMessage::pong());
        assert_eq!(reached, 2);
        assert!(matches!(rx_first.try_recv(), Ok(ServerMessage::Pong { .. })));
        assert!(matches!(rx_second.try_recv(), Ok(ServerMessage::Pong { .. })));
        assert!(matches!(rx_other.try_recv(), Err(TryRecvError::Empty)));

        registry.disconnect(first);
        assert_eq!(registry.user_connection_count("alice"), 1);

        registry.disconnect(second);
        assert_eq!(registry.user_connection_count("alice"), 0);
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn test_subscribe_primes_with_cached_price() {
        let registry = ConnectionRegistry::new();
        registry.record_price(quote("AAPL", 190.0));
        let (id, mut rx) = connect(&registry, None);

        assert!(registry.subscribe(id, symbol("aapl")));

        match rx.try_recv() {
            Ok(ServerMessage::PriceUpdate { symbol, data, .. }) => {
                assert_eq!(symbol.as_str(), "AAPL");
                assert_eq!(data.price, 190.0);
            }
            other => panic!("expected price_update first, got {:?}", other),
        }
        match rx.try_recv() {
            Ok(ServerMessage::SubscriptionConfirmed { symbol, message }) => {
                assert_eq!(symbol.as_str(), "AAPL");
                assert!(message.contains("AAPL"));
            }
            other => panic!("expected subscription_confirmed, got {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_without_cache_only_confirms() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = connect(&registry, None);

        registry.subscribe(id, symbol("MSFT"));
        registry.subscribe(id, symbol("msft"));

        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::SubscriptionConfirmed { .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::SubscriptionConfirmed { .. })
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(registry.subscriptions_of(id).unwrap().len(), 1);
    }

    #[test]
    fn test_subscribe_unknown_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.subscribe(ConnectionId(42), symbol("AAPL")));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_broadcast_isolates_failed_connection() {
        let registry = ConnectionRegistry::new();
        let (a, rx_a) = connect(&registry, Some("alice"));
        let (b, mut rx_b) = connect(&registry, None);
        drop(rx_a);

        let state = registry.record_price(quote("BTC-USD", 100.0));
        let delivered = registry.broadcast(ServerMessage::price_update(state));

        assert_eq!(delivered, 1);
        assert!(matches!(rx_b.try_recv(), Ok(ServerMessage::PriceUpdate { .. })));
        assert!(!registry.is_connected(a));
        assert!(registry.is_connected(b));
        assert_eq!(registry.user_count(), 0);
    }

    #[test]
    fn test_broadcast_ignores_subscriptions() {
        let registry = ConnectionRegistry::new();
        let (subscribed, mut rx_subscribed) = connect(&registry, None);
        let (_plain, mut rx_plain) = connect(&registry, None);

        registry.subscribe(subscribed, symbol("AAPL"));
        let _ = rx_subscribed.try_recv();

        let state = registry.record_price(quote("ETH-USD", 3_000.0));
        assert_eq!(registry.broadcast(ServerMessage::price_update(state)), 2);

        let first = rx_subscribed.try_recv().unwrap();
        let second = rx_plain.try_recv().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_broadcast_stamps_current_time() {
        let registry = ConnectionRegistry::new();
        let (_id, mut rx) = connect(&registry, None);

        let stale = DateTime::from_timestamp(1_000, 0).unwrap();
        let before = Utc::now();
        registry.broadcast(ServerMessage::Pong { timestamp: stale });

        match rx.try_recv() {
            Ok(ServerMessage::Pong { timestamp }) => assert!(timestamp >= before),
            other => panic!("expected pong, got {:?}", other),
        }
    }

    #[test]
    fn test_send_failure_disconnects() {
        let registry = ConnectionRegistry::new();
        let (id, rx) = connect(&registry, None);
        drop(rx);

        assert!(!registry.send_to_one(id, ServerMessage::pong()));
        assert!(!registry.is_connected(id));
    }

    #[test]
    fn test_full_queue_drops_message_but_keeps_connection() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = registry.connect(tx, None);

        assert!(!registry.send_to_one(
            id,
            ServerMessage::error(ErrorCode::InternalError, "overflow")
        ));
        assert!(registry.is_connected(id));
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::ConnectionEstablished { .. })
        ));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_record_price_tracks_change() {
        let registry = ConnectionRegistry::new();

        let first = registry.record_price(quote("BTC-USD", 100.0));
        assert_eq!(first.change, 0.0);

        let second = registry.record_price(quote("btc-usd", 110.0));
        assert_eq!(second.prev_price, 100.0);
        assert_eq!(second.change, 10.0);
        assert_eq!(second.change_percent, 10.0);
        assert_eq!(registry.cached_symbol_count(), 1);
        assert_eq!(registry.cached_price(&symbol("BTC-USD")), Some(second));
    }

    #[test]
    fn test_stats() {
        let registry = ConnectionRegistry::new();
        let (_a, _rx_a) = connect(&registry, Some("alice"));
        let (_b, _rx_b) = connect(&registry, None);
        registry.record_price(quote("AAPL", 1.0));

        let stats = registry.stats(true);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.cached_symbols, 1);
        assert!(stats.is_running);
    }
}
