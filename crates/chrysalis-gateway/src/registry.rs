use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use chrysalis_types::events::GatewayEvent;

/// Connection registry owned by the server process and injected into
/// whoever needs to publish events. Community-wide events fan out over
/// a broadcast channel; per-user notifications go through registered
/// targeted channels. No global state, no lazy singletons.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Broadcast channel for gateway events; every connected client
    /// receives every broadcast.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Track online users: user_id -> username
    online_users: RwLock<HashMap<Uuid, String>>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Registry {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(RegistryInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    /// A reconnect replaces the previous registration; the conn_id lets
    /// the old connection's teardown recognize it no longer owns the
    /// entry.
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a per-user targeted channel, but only if conn_id matches.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&user_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&user_id);
            }
        }
    }

    /// Send a targeted event to a specific user, if connected.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Register a user as online.
    pub async fn user_online(&self, user_id: Uuid, username: String) {
        self.inner
            .online_users
            .write()
            .await
            .insert(user_id, username.clone());

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            username,
            online: true,
        });
    }

    /// Register a user as offline. Only cleans up if conn_id still owns
    /// the registration; a newer connection's state is left alone.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) {
        let is_current = {
            let channels = self.inner.user_channels.read().await;
            channels
                .get(&user_id)
                .is_some_and(|(cid, _)| *cid == conn_id)
        };
        if !is_current {
            return;
        }

        let username = self
            .inner
            .online_users
            .write()
            .await
            .remove(&user_id)
            .unwrap_or_default();

        self.unregister_user_channel(user_id, conn_id).await;

        self.broadcast(GatewayEvent::PresenceUpdate {
            user_id,
            username,
            online: false,
        });
    }

    /// Get list of online users.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    /// Explicit shutdown: drop all targeted channels so connection
    /// loops drain and exit.
    pub async fn shutdown(&self) {
        self.inner.user_channels.write().await.clear();
        self.inner.online_users.write().await.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn targeted_send_reaches_only_the_registered_user() {
        let registry = Registry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_conn, mut alice_rx) = registry.register_user_channel(alice).await;

        registry
            .send_to_user(
                alice,
                GatewayEvent::AchievementUnlocked {
                    achievement_id: Uuid::new_v4(),
                    code: "FIRST_MEADOW_VISIT".into(),
                    title: "First Steps".into(),
                },
            )
            .await;
        registry
            .send_to_user(
                bob,
                GatewayEvent::AchievementUnlocked {
                    achievement_id: Uuid::new_v4(),
                    code: "FULL_BUTTERFLY".into(),
                    title: "Full Transformation".into(),
                },
            )
            .await;

        let received = alice_rx.recv().await.unwrap();
        assert!(matches!(
            received,
            GatewayEvent::AchievementUnlocked { ref code, .. } if code == "FIRST_MEADOW_VISIT"
        ));
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_connection_cannot_tear_down_its_successor() {
        let registry = Registry::new();
        let user = Uuid::new_v4();

        let (old_conn, _old_rx) = registry.register_user_channel(user).await;
        registry.user_online(user, "ada".into()).await;
        // Reconnect takes over the registration.
        let (_new_conn, mut new_rx) = registry.register_user_channel(user).await;

        // The old connection's teardown must be a no-op now.
        registry.user_offline(user, old_conn).await;

        registry
            .send_to_user(
                user,
                GatewayEvent::VoteCast {
                    proposal_id: Uuid::new_v4(),
                    total_votes: 1,
                },
            )
            .await;
        assert!(new_rx.recv().await.is_some());
        assert_eq!(registry.online_users().await.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_fans_out_to_all_subscribers() {
        let registry = Registry::new();
        let mut rx1 = registry.subscribe();
        let mut rx2 = registry.subscribe();

        registry.broadcast(GatewayEvent::VoteCast {
            proposal_id: Uuid::new_v4(),
            total_votes: 7,
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            GatewayEvent::VoteCast { total_votes: 7, .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            GatewayEvent::VoteCast { total_votes: 7, .. }
        ));
    }
}
