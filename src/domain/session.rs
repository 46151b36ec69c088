use crate::domain::model::{BlockStatus, Identity, UserProfile};
use crate::utils::error::{Result, StorefrontError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    Subscribing,
    Subscribed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    SignedIn {
        user: UserProfile,
        phase: SubscriptionPhase,
        block: Option<BlockStatus>,
    },
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::SignedOut => "signed-out",
            SessionState::SignedIn {
                phase: SubscriptionPhase::Subscribing,
                ..
            } => "subscribing",
            SessionState::SignedIn {
                phase: SubscriptionPhase::Subscribed,
                ..
            } => "subscribed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    owner_email: String,
    state: SessionState,
}

impl Session {
    pub fn new(owner_email: impl Into<String>) -> Self {
        Self {
            owner_email: owner_email.into(),
            state: SessionState::SignedOut,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn sign_in(&mut self, identity: &Identity) -> Result<&UserProfile> {
        if !matches!(self.state, SessionState::SignedOut) {
            return Err(self.invalid("sign-in"));
        }
        self.state = SessionState::SignedIn {
            user: UserProfile::from_identity(identity, &self.owner_email),
            phase: SubscriptionPhase::Subscribing,
            block: None,
        };
        self.user().ok_or_else(|| self.invalid("sign-in"))
    }

    pub fn mark_subscribed(&mut self) -> Result<()> {
        let subscribing = matches!(
            self.state,
            SessionState::SignedIn {
                phase: SubscriptionPhase::Subscribing,
                ..
            }
        );
        if !subscribing {
            return Err(self.invalid("mark-subscribed"));
        }
        if let SessionState::SignedIn { phase, .. } = &mut self.state {
            *phase = SubscriptionPhase::Subscribed;
        }
        Ok(())
    }

    pub fn set_block_status(&mut self, status: Option<BlockStatus>) -> Result<()> {
        match &mut self.state {
            SessionState::SignedIn { block, .. } => {
                *block = status;
                Ok(())
            }
            SessionState::SignedOut => Err(StorefrontError::InvalidTransition {
                from: "signed-out".to_string(),
                via: "set-block-status".to_string(),
            }),
        }
    }

    /// Sign-out is valid from any state; returns whether a user was signed in.
    pub fn sign_out(&mut self) -> bool {
        let was_signed_in = !matches!(self.state, SessionState::SignedOut);
        self.state = SessionState::SignedOut;
        was_signed_in
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            SessionState::SignedIn { user, .. } => Some(user),
            SessionState::SignedOut => None,
        }
    }

    pub fn require_user(&self) -> Result<&UserProfile> {
        self.user().ok_or_else(|| self.invalid("require-user"))
    }

    pub fn require_owner(&self, action: &str) -> Result<&UserProfile> {
        let user = self.require_user()?;
        if !user.is_owner {
            return Err(StorefrontError::permission(action));
        }
        Ok(user)
    }

    /// 已登入且未被封鎖；封鎖期間整個帳號功能都停用
    pub fn require_active(&self, now_ms: i64) -> Result<&UserProfile> {
        let user = self.require_user()?;
        if self.is_blocked(now_ms) {
            return Err(StorefrontError::AccountBlocked);
        }
        Ok(user)
    }

    pub fn is_owner(&self) -> bool {
        self.user().map(|u| u.is_owner).unwrap_or(false)
    }

    pub fn is_blocked(&self, now_ms: i64) -> bool {
        match &self.state {
            SessionState::SignedIn {
                block: Some(status),
                ..
            } => status.is_active(now_ms),
            _ => false,
        }
    }

    fn invalid(&self, via: &str) -> StorefrontError {
        StorefrontError::InvalidTransition {
            from: self.state.name().to_string(),
            via: via.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> Identity {
        Identity {
            uid: "u1".to_string(),
            email: email.to_string(),
            display_name: Some("Ali".to_string()),
            photo_url: None,
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = Session::new("owner@example.com");
        assert!(session.user().is_none());

        session.sign_in(&identity("ali@example.com")).unwrap();
        assert!(matches!(
            session.state(),
            SessionState::SignedIn {
                phase: SubscriptionPhase::Subscribing,
                ..
            }
        ));

        session.mark_subscribed().unwrap();
        assert!(session.mark_subscribed().is_err());
        assert!(session.sign_out());
        assert_eq!(session.state(), &SessionState::SignedOut);
        assert!(!session.sign_out());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = Session::new("owner@example.com");
        assert!(session.mark_subscribed().is_err());
        assert!(session.require_user().is_err());

        session.sign_in(&identity("ali@example.com")).unwrap();
        assert!(session.sign_in(&identity("ali@example.com")).is_err());
    }

    #[test]
    fn test_owner_gate_and_block() {
        let mut session = Session::new("owner@example.com");
        session.sign_in(&identity("ali@example.com")).unwrap();
        assert!(matches!(
            session.require_owner("broadcast"),
            Err(StorefrontError::PermissionDenied { .. })
        ));

        session.set_block_status(Some(BlockStatus::until(100))).unwrap();
        assert!(session.is_blocked(50));
        assert!(!session.is_blocked(150));
        assert!(matches!(session.require_active(50), Err(StorefrontError::AccountBlocked)));
        assert_eq!(session.require_active(150).unwrap().uid, "u1");

        session.sign_out();
        session.sign_in(&identity("OWNER@example.com")).unwrap();
        assert!(session.require_owner("broadcast").is_ok());
    }
}
