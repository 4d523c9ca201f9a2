use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Otp {
    username: String,
    created: Instant,
}

/// One-time tokens handed out by `/login` and redeemed by the websocket upgrade.
#[derive(Debug, Clone)]
pub struct OtpStore {
    tokens: Arc<Mutex<HashMap<String, Otp>>>,
    retention: Duration,
}

impl OtpStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    pub fn issue(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let otp = Otp {
            username: username.to_string(),
            created: Instant::now(),
        };
        self.lock().insert(token.clone(), otp);
        tracing::debug!(client.name = %username, "Issued one-time token");
        token
    }

    /// Consumes the token. Returns the username it was issued to if still fresh.
    pub fn verify(&self, token: &str) -> Option<String> {
        let otp = self.lock().remove(token)?;
        if otp.created.elapsed() > self.retention {
            tracing::debug!(client.name = %otp.username, "Rejected expired token");
            return None;
        }
        Some(otp.username)
    }

    /// Drops expired tokens and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let retention = self.retention;
        let mut tokens = self.lock();
        let before = tokens.len();
        tokens.retain(|_, otp| otp.created.elapsed() <= retention);
        before - tokens.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::trace!(removed, "Swept expired tokens");
                }
            }
        })
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Otp>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
