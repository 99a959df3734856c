use rolegate_auth::{Principal, SessionId};

/// Principal context for a request (authenticated identity + authorities).
///
/// Inserted by the access middleware when the request carries a live session;
/// immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    session_id: SessionId,
}

impl PrincipalContext {
    pub fn new(principal: Principal, session_id: SessionId) -> Self {
        Self {
            principal,
            session_id,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}
