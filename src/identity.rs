// ABOUTME: Session identity — the user identifier and opaque session token.
// ABOUTME: Resolved once from the host's authentication context, immutable after.

use chrono::{DateTime, Utc};

/// Host-supplied authentication context. The embedding application
/// implements this to expose its logged-in user, if any.
pub trait AuthContext {
    /// Identifier of the authenticated user (typically an email address),
    /// or `None` when nobody is logged in.
    fn user_id(&self) -> Option<String>;
}

/// Auth context for hosts without authentication. Yields an empty
/// identity, which is valid, not an error.
pub struct NoAuth;

impl AuthContext for NoAuth {
    fn user_id(&self) -> Option<String> {
        None
    }
}

/// Identity of one conversation session. Created once per conversation
/// when the controller is constructed and never recreated mid-session.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    user_id: String,
    session_token: String,
    created_at: DateTime<Utc>,
}

impl SessionIdentity {
    /// Derive the identity from the host auth context. An absent user
    /// yields an empty identifier. The session token starts empty; it is
    /// a stub field kept for forward compatibility, nothing in the crate
    /// consumes it.
    pub fn resolve(auth: &dyn AuthContext) -> Self {
        Self {
            user_id: auth.user_id().unwrap_or_default(),
            session_token: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Identity with a freshly generated opaque session token, for hosts
    /// that want per-conversation correlation on their backend.
    pub fn with_generated_token(auth: &dyn AuthContext) -> Self {
        let mut identity = Self::resolve(auth);
        identity.session_token = uuid::Uuid::new_v4().to_string();
        identity
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.session_token
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAuth(&'static str);

    impl AuthContext for FixedAuth {
        fn user_id(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn resolves_user_from_auth_context() {
        let identity = SessionIdentity::resolve(&FixedAuth("alex@example.com"));
        assert_eq!(identity.user_id(), "alex@example.com");
        assert_eq!(identity.token(), "");
    }

    #[test]
    fn missing_auth_yields_empty_identity() {
        let identity = SessionIdentity::resolve(&NoAuth);
        assert_eq!(identity.user_id(), "");
    }

    #[test]
    fn generated_tokens_are_unique() {
        let a = SessionIdentity::with_generated_token(&NoAuth);
        let b = SessionIdentity::with_generated_token(&NoAuth);
        assert!(!a.token().is_empty());
        assert_ne!(a.token(), b.token());
    }
}
