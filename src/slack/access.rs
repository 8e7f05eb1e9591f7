//! Deny-by-default token/team authentication for inbound callbacks.
//!
//! A rule maps a verification token either to one team id or to any team.
//! Rules come from an [`AccessProvider`], which is consulted afresh on every
//! request so that store-backed rules take effect immediately.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::kv::{KeyValueStore, KvError};

/// Namespace holding store-backed access rules unless configured otherwise.
pub const DEFAULT_ACCESS_NAMESPACE: &str = "slack::access";

/// Value stored for a token that is valid for every team.
pub const ANY_TEAM: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    AnyTeam,
    Team(String),
}

impl AccessRule {
    /// Interprets a stored rule value: `*` or `true` mean any team, anything
    /// else non-empty is a team id. Null or empty values grant nothing.
    pub fn from_stored(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim)? {
            "" => None,
            ANY_TEAM => Some(Self::AnyTeam),
            v if v.eq_ignore_ascii_case("true") => Some(Self::AnyTeam),
            team => Some(Self::Team(team.to_string())),
        }
    }

    pub fn as_stored(&self) -> &str {
        match self {
            Self::AnyTeam => ANY_TEAM,
            Self::Team(team) => team,
        }
    }
}

/// Source of access rules.
pub trait AccessProvider: Send + Sync {
    fn rule_for(&self, token: &str) -> Result<Option<AccessRule>>;
}

/// Rules fixed at construction, usually from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticAccess {
    rules: HashMap<String, AccessRule>,
}

impl StaticAccess {
    pub fn new(rules: HashMap<String, AccessRule>) -> Self {
        Self { rules }
    }

    pub fn allow(mut self, token: impl Into<String>, rule: AccessRule) -> Self {
        self.rules.insert(token.into(), rule);
        self
    }
}

impl AccessProvider for StaticAccess {
    fn rule_for(&self, token: &str) -> Result<Option<AccessRule>> {
        Ok(self.rules.get(token).cloned())
    }
}

/// Rules stored as `token -> team id | *` in a key-value namespace.
#[derive(Clone)]
pub struct StoreAccess {
    store: KeyValueStore,
    namespace: String,
}

impl StoreAccess {
    pub fn new(store: KeyValueStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn grant(&self, token: &str, rule: &AccessRule) -> Result<()> {
        let segment = self.store.get(&self.namespace, None, true)?;
        segment.write(token, rule.as_stored())?;
        Ok(())
    }

    /// Returns false if the token had no rule.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        if !self.store.exists(&self.namespace)? {
            return Ok(false);
        }
        let segment = self.store.get(&self.namespace, None, false)?;
        match segment.remove(token) {
            Ok(()) => Ok(true),
            Err(KvError::KeyNotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl AccessProvider for StoreAccess {
    fn rule_for(&self, token: &str) -> Result<Option<AccessRule>> {
        // Reading must never create the namespace.
        if !self.store.exists(&self.namespace)? {
            return Ok(None);
        }
        let segment = self.store.get(&self.namespace, None, false)?;
        match segment.read(token) {
            Ok(value) => Ok(AccessRule::from_stored(value.as_deref())),
            Err(KvError::KeyNotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    UnknownToken,
    TeamMismatch,
    LookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Clone)]
pub struct Authenticator {
    provider: Arc<dyn AccessProvider>,
}

impl Authenticator {
    pub fn new(provider: impl AccessProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn from_arc(provider: Arc<dyn AccessProvider>) -> Self {
        Self { provider }
    }

    /// Decides whether a request carrying `token` and `team_id` may proceed.
    /// Anything other than a positive match is a denial.
    pub fn check(&self, token: Option<&str>, team_id: Option<&str>) -> AccessDecision {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return AccessDecision::Denied(DenyReason::MissingToken);
        };

        let rule = match self.provider.rule_for(token) {
            Ok(Some(rule)) => rule,
            Ok(None) => return AccessDecision::Denied(DenyReason::UnknownToken),
            Err(e) => {
                tracing::error!("Access rule lookup failed: {:#}", e);
                return AccessDecision::Denied(DenyReason::LookupFailed);
            }
        };

        match rule {
            AccessRule::AnyTeam => AccessDecision::Allowed,
            AccessRule::Team(team) if team_id == Some(team.as_str()) => AccessDecision::Allowed,
            AccessRule::Team(_) => AccessDecision::Denied(DenyReason::TeamMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn authenticator() -> Authenticator {
        Authenticator::new(
            StaticAccess::default()
                .allow("token-with-team", AccessRule::Team("my-team-id".into()))
                .allow("token-without-team", AccessRule::AnyTeam),
        )
    }

    #[test]
    fn wildcard_token_accepts_any_team() {
        let auth = authenticator();
        assert!(auth.check(Some("token-without-team"), Some("T1")).is_allowed());
        assert!(auth.check(Some("token-without-team"), Some("T2")).is_allowed());
        assert!(auth.check(Some("token-without-team"), None).is_allowed());
    }

    #[test]
    fn team_token_requires_matching_team() {
        let auth = authenticator();
        assert!(auth.check(Some("token-with-team"), Some("my-team-id")).is_allowed());
        assert_eq!(
            auth.check(Some("token-with-team"), Some("wrong-team-id")),
            AccessDecision::Denied(DenyReason::TeamMismatch)
        );
        assert_eq!(
            auth.check(Some("token-with-team"), None),
            AccessDecision::Denied(DenyReason::TeamMismatch)
        );
    }

    #[test]
    fn unknown_or_missing_token_is_denied() {
        let auth = authenticator();
        assert_eq!(
            auth.check(Some("wrong-token"), Some("my-team-id")),
            AccessDecision::Denied(DenyReason::UnknownToken)
        );
        assert_eq!(
            auth.check(None, Some("my-team-id")),
            AccessDecision::Denied(DenyReason::MissingToken)
        );
        assert_eq!(
            auth.check(Some(""), None),
            AccessDecision::Denied(DenyReason::MissingToken)
        );
    }

    struct FailingProvider;

    impl AccessProvider for FailingProvider {
        fn rule_for(&self, _token: &str) -> Result<Option<AccessRule>> {
            anyhow::bail!("store unavailable")
        }
    }

    #[test]
    fn provider_failure_is_denied() {
        let auth = Authenticator::new(FailingProvider);
        assert_eq!(
            auth.check(Some("any"), None),
            AccessDecision::Denied(DenyReason::LookupFailed)
        );
    }

    #[test]
    fn stored_rule_values() {
        assert_eq!(AccessRule::from_stored(Some("*")), Some(AccessRule::AnyTeam));
        assert_eq!(AccessRule::from_stored(Some("true")), Some(AccessRule::AnyTeam));
        assert_eq!(
            AccessRule::from_stored(Some("T0ET1EF89")),
            Some(AccessRule::Team("T0ET1EF89".into()))
        );
        assert_eq!(AccessRule::from_stored(None), None);
        assert_eq!(AccessRule::from_stored(Some("")), None);
        assert_eq!(AccessRule::from_stored(Some("  ")), None);
    }

    #[test]
    fn null_or_empty_stored_rule_is_denied() {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let store = KeyValueStore::new(db);
        let segment = store.get(DEFAULT_ACCESS_NAMESPACE, None, true).unwrap();
        segment.write("null-token", None::<&str>).unwrap();
        segment.write("empty-token", "").unwrap();

        let auth = Authenticator::new(StoreAccess::new(store, DEFAULT_ACCESS_NAMESPACE));
        assert_eq!(
            auth.check(Some("null-token"), Some("EVIL")),
            AccessDecision::Denied(DenyReason::UnknownToken)
        );
        assert_eq!(
            auth.check(Some("empty-token"), Some("EVIL")),
            AccessDecision::Denied(DenyReason::UnknownToken)
        );
        assert!(!auth.check(Some("empty-token"), None).is_allowed());
    }

    #[test]
    fn store_backed_rules_are_read_fresh() {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        let store = KeyValueStore::new(db);
        let access = StoreAccess::new(store.clone(), DEFAULT_ACCESS_NAMESPACE);
        let auth = Authenticator::new(access.clone());

        assert!(!auth.check(Some("tok"), Some("T1")).is_allowed());
        assert!(!store.exists(DEFAULT_ACCESS_NAMESPACE).unwrap());

        access.grant("tok", &AccessRule::Team("T1".into())).unwrap();
        assert!(auth.check(Some("tok"), Some("T1")).is_allowed());
        assert!(!auth.check(Some("tok"), Some("T2")).is_allowed());

        access.grant("tok", &AccessRule::AnyTeam).unwrap();
        assert!(auth.check(Some("tok"), Some("T2")).is_allowed());

        assert!(access.revoke("tok").unwrap());
        assert!(!access.revoke("tok").unwrap());
        assert!(!auth.check(Some("tok"), Some("T1")).is_allowed());
    }
}
