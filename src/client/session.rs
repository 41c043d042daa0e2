use std::{
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use tracing::{debug, info, warn};

use super::access::{GateDecision, GateState};
use super::error::ClientError;
use crate::auth::dto::PublicUser;

/// Persistent home of the bearer token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.token.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Token kept in a plain file, the desktop analogue of browser storage.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s.trim().to_string()).filter(|t| !t.is_empty())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Signed-in state shared by the HTTP client and the route gate.
pub struct Session {
    store: Arc<dyn TokenStore>,
    user: RwLock<Option<PublicUser>>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            user: RwLock::new(None),
        }
    }

    pub fn token(&self) -> Result<Option<String>, ClientError> {
        self.store.load()
    }

    pub fn sign_in(&self, token: &str, user: PublicUser) -> Result<(), ClientError> {
        self.store.save(token)?;
        self.set_user(Some(user));
        Ok(())
    }

    pub fn user(&self) -> Option<PublicUser> {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_user(&self, user: Option<PublicUser>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Drop the token and profile after the server rejected them.
    pub fn handle_unauthorized(&self) -> Result<(), ClientError> {
        info!("session rejected by server; clearing token");
        self.set_user(None);
        self.store.clear()
    }

    pub fn sign_out(&self) -> Result<(), ClientError> {
        self.set_user(None);
        self.store.clear()
    }

    pub fn gate_state(&self, path: &str) -> GateState {
        let role = self.user().map(|u| u.role);
        let has_token = match self.token() {
            Ok(token) => token.is_some(),
            Err(e) => {
                warn!(error = %e, "token store unreadable; treating as signed out");
                false
            }
        };
        GateState::evaluate(has_token, role, path)
    }

    /// Decide what happens on navigation to `path`.
    pub fn gate(&self, path: &str) -> GateDecision {
        let state = self.gate_state(path);
        debug!(path, ?state, "route gate");
        state.decision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::client::access::LOGIN_PATH;
    use time::OffsetDateTime;
    use uuid::Uuid;

    pub(crate) fn user(role: Role) -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            username: "clerk".into(),
            full_name: "Ward Clerk".into(),
            role,
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("auth").join("token"));
        assert_eq!(store.load().unwrap(), None);
        store.save("abc.def").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc.def"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn unauthorized_purges_and_next_navigation_goes_to_login() {
        let session = Session::new(Arc::new(MemoryTokenStore::default()));
        session.sign_in("tok", user(Role::Admin)).unwrap();
        assert_eq!(session.gate("/residents"), GateDecision::Render);

        session.handle_unauthorized().unwrap();
        assert_eq!(session.token().unwrap(), None);
        assert_eq!(session.gate("/residents"), GateDecision::RedirectToLogin);
        assert_eq!(LOGIN_PATH, "/login");
    }

    #[test]
    fn unreadable_token_file_is_an_error_not_a_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the token file should be cannot be read as a file.
        let path = dir.path().join("token");
        fs::create_dir(&path).unwrap();
        let session = Session::new(Arc::new(FileTokenStore::new(path.clone())));
        assert!(matches!(session.token(), Err(ClientError::Store(_))));
        assert_eq!(session.gate("/residents"), GateDecision::RedirectToLogin);
    }

    #[test]
    fn token_without_profile_passes_through() {
        let store = Arc::new(MemoryTokenStore::default());
        store.save("tok").unwrap();
        let session = Session::new(store);
        assert_eq!(session.gate("/settings/accounts"), GateDecision::Passthrough);
        session.set_user(Some(user(Role::Staff)));
        assert_eq!(
            session.gate("/settings/accounts"),
            GateDecision::ShowPopup { return_to: "/dashboard" }
        );
    }
}
