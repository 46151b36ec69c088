use crate::domain::model::Identity;
use crate::domain::ports::IdentityProvider;

/// Identity fixed at startup, from CLI flags or the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    identity: Option<Identity>,
}

impl StaticIdentity {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// STOREFRONT_UID 必填，其餘選填
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let identity = var("STOREFRONT_UID").map(|uid| Identity {
            uid,
            email: var("STOREFRONT_EMAIL").unwrap_or_default(),
            display_name: var("STOREFRONT_NAME"),
            photo_url: None,
        });
        Self { identity }
    }

    /// Flags win over the environment.
    pub fn or_else(self, fallback: StaticIdentity) -> Self {
        if self.identity.is_some() {
            self
        } else {
            fallback
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Identity> {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_take_precedence() {
        let flags = StaticIdentity::new(Some(Identity {
            uid: "flag-user".to_string(),
            email: "a@example.com".to_string(),
            display_name: None,
            photo_url: None,
        }));
        let env = StaticIdentity::new(Some(Identity {
            uid: "env-user".to_string(),
            email: String::new(),
            display_name: None,
            photo_url: None,
        }));

        assert_eq!(flags.or_else(env.clone()).current().unwrap().uid, "flag-user");
        assert_eq!(StaticIdentity::anonymous().or_else(env).current().unwrap().uid, "env-user");
        assert!(StaticIdentity::anonymous().current().is_none());
    }
}
