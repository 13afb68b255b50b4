use crate::ports::{CredentialStorage, TimeProvider};
use crate::types::{Credential, Identity, Session};

mod decode;

pub use decode::{CredentialDecoder, DecodeError, DecoderOptions};

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the credential slot and publishes the current session.
///
/// Decode failures never reach the caller: the credential is discarded and
/// the provider falls back to the anonymous state.
pub struct SessionProvider<S, T> {
    storage: S,
    decoder: CredentialDecoder,
    time: T,
    current: watch::Sender<Option<Session>>,
}

impl<S, T> SessionProvider<S, T>
where
    S: CredentialStorage,
    T: TimeProvider,
{
    pub fn new(storage: S, decoder: CredentialDecoder, time: T) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            storage,
            decoder,
            time,
            current,
        }
    }

    /// Startup path: silently adopt a stored credential if it still decodes.
    pub fn restore(&self) -> Option<Identity> {
        let token = match self.storage.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no stored credential");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "failed to read stored credential");
                return None;
            }
        };

        match self.decoder.decode(&token, self.time.now()) {
            Ok(identity) => {
                info!(email = %identity.email, "restored session");
                self.publish(Some(Session {
                    identity: identity.clone(),
                    credential: Credential::new(token),
                }));
                Some(identity)
            }
            Err(err) => {
                warn!(error = %err, "discarding stored credential");
                self.discard_stored();
                self.publish(None);
                None
            }
        }
    }

    pub fn login(&self, token: &str) -> Option<Identity> {
        let token = token.trim();
        let identity = match self.decoder.decode(token, self.time.now()) {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "login rejected: credential could not be decoded");
                self.discard_stored();
                self.publish(None);
                return None;
            }
        };

        if let Err(err) = self.storage.save(token) {
            warn!(error = %err, "failed to persist credential; session lasts until exit");
        }
        info!(email = %identity.email, roles = ?identity.roles, "signed in");
        self.publish(Some(Session {
            identity: identity.clone(),
            credential: Credential::new(token),
        }));
        Some(identity)
    }

    pub fn logout(&self) {
        self.discard_stored();
        if self.publish(None) {
            info!("signed out");
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        self.current
            .borrow()
            .as_ref()
            .map(|session| session.identity.clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    fn discard_stored(&self) {
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to clear stored credential");
        }
    }

    fn publish(&self, next: Option<Session>) -> bool {
        self.current.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }
}
