use std::sync::{Arc, PoisonError, RwLock};

/// Bearer credential shared by every request of a client.
///
/// Cloning shares the same slot, so clearing it after a 401 signs out every
/// holder at once.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    token: Arc<RwLock<Option<String>>>,
}

impl AuthContext {
    pub fn with_token(token: impl Into<String>) -> Self {
        let auth = Self::default();
        auth.set_token(token);
        auth
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = (!token.trim().is_empty()).then_some(token);
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
