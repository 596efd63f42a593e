//! Scope Resolver (§4.A) — tenant identifiers, merge rules, and the filter
//! predicate every store query must honor.

use crate::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Tenant scope. Every field is optional at the type level; the resolver
/// enforces that at least one of `user_id` / `agent_id` / `run_id` is set on
/// any mutating request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub run_id: Option<String>,
    pub app_id: Option<String>,
}

/// Characters permitted in a scope field, grounded in the teacher's own
/// `DatabaseConfig::validate` style of hand-rolled validation rather than a
/// regex-heavy DSL.
fn is_valid_field(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/' | '-'))
}

impl Scope {
    /// True if at least one identifying field (user/agent/run) is present.
    pub fn has_identity(&self) -> bool {
        self.user_id.is_some() || self.agent_id.is_some() || self.run_id.is_some()
    }

    /// Validate every present field against the allowed character set.
    pub fn validate_charset(&self) -> MemoryResult<()> {
        let fields: [(&str, &Option<String>); 6] = [
            ("org_id", &self.org_id),
            ("project_id", &self.project_id),
            ("user_id", &self.user_id),
            ("agent_id", &self.agent_id),
            ("run_id", &self.run_id),
            ("app_id", &self.app_id),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !is_valid_field(v) {
                    return Err(MemoryError::InvalidScope(format!(
                        "field '{name}' contains characters outside [A-Za-z0-9_.:/-]"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate this scope as a target for a mutating call.
    pub fn validate_for_mutation(&self) -> MemoryResult<()> {
        self.validate_charset()?;
        if !self.has_identity() {
            return Err(MemoryError::InvalidScope(
                "at least one of user_id, agent_id, or run_id must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate this scope as a target for a query. Queries additionally
    /// require at least one identifying field per §3.
    pub fn validate_for_query(&self) -> MemoryResult<()> {
        self.validate_for_mutation()
    }

    /// Deterministic, order-independent namespace key for this scope, used
    /// to physically isolate vector collections per tenant when a
    /// deployment chooses that isolation strategy.
    pub fn collection_key(&self) -> String {
        let mut out = String::new();
        let parts: [(&str, &Option<String>); 6] = [
            ("o", &self.org_id),
            ("p", &self.project_id),
            ("u", &self.user_id),
            ("a", &self.agent_id),
            ("r", &self.run_id),
            ("app", &self.app_id),
        ];
        for (prefix, value) in parts {
            if let Some(v) = value {
                if !out.is_empty() {
                    out.push('/');
                }
                let _ = write!(out, "{prefix}:{v}");
            }
        }
        if out.is_empty() {
            "default".to_string()
        } else {
            out
        }
    }

    /// True if `other` is equal to this scope under the equality filter every
    /// store operation applies — this is invariant 1 ("tenant isolation")
    /// expressed as a predicate so both store implementations can share it.
    pub fn matches(&self, other: &Scope) -> bool {
        self == other
    }

    /// Merge a request-level scope onto this deployment-level default scope:
    /// a present request field overrides the default, an absent one falls
    /// back to the default.
    pub fn merge_request(&self, request: &Scope) -> Scope {
        Scope {
            org_id: request.org_id.clone().or_else(|| self.org_id.clone()),
            project_id: request
                .project_id
                .clone()
                .or_else(|| self.project_id.clone()),
            user_id: request.user_id.clone().or_else(|| self.user_id.clone()),
            agent_id: request.agent_id.clone().or_else(|| self.agent_id.clone()),
            run_id: request.run_id.clone().or_else(|| self.run_id.clone()),
            app_id: request.app_id.clone().or_else(|| self.app_id.clone()),
        }
    }
}

/// Resolves a request-level scope against a deployment default, producing an
/// immutable `Scope` ready to hand to a store.
#[derive(Debug, Clone, Default)]
pub struct ScopeResolver {
    default_scope: Scope,
}

impl ScopeResolver {
    pub fn new(default_scope: Scope) -> Self {
        Self { default_scope }
    }

    /// Resolve and validate a scope for a mutating call (`add`, `update`,
    /// `delete`, `delete_all`, `set_state`).
    pub fn resolve_for_mutation(&self, request: &Scope) -> MemoryResult<Scope> {
        let resolved = self.default_scope.merge_request(request);
        resolved.validate_for_mutation()?;
        Ok(resolved)
    }

    /// Resolve and validate a scope for a read call (`search`, `get`,
    /// `list`, `history`).
    pub fn resolve_for_query(&self, request: &Scope) -> MemoryResult<Scope> {
        let resolved = self.default_scope.merge_request(request);
        resolved.validate_for_query()?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(user: &str) -> Scope {
        Scope {
            user_id: Some(user.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_mutation_without_identity() {
        let resolver = ScopeResolver::default();
        let err = resolver.resolve_for_mutation(&Scope::default()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidScope(_)));
    }

    #[test]
    fn rejects_bad_characters() {
        let resolver = ScopeResolver::default();
        let bad = Scope {
            user_id: Some("alice;drop table".to_string()),
            ..Default::default()
        };
        let err = resolver.resolve_for_mutation(&bad).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidScope(_)));
    }

    #[test]
    fn request_overrides_default_per_field() {
        let resolver = ScopeResolver::new(Scope {
            org_id: Some("acme".to_string()),
            user_id: Some("default-user".to_string()),
            ..Default::default()
        });
        let resolved = resolver.resolve_for_mutation(&scope("alice")).unwrap();
        assert_eq!(resolved.org_id.as_deref(), Some("acme"));
        assert_eq!(resolved.user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn collection_key_is_deterministic_and_order_independent() {
        let a = Scope {
            user_id: Some("alice".to_string()),
            agent_id: Some("bot1".to_string()),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(a.collection_key(), b.collection_key());
        assert_eq!(a.collection_key(), "u:alice/a:bot1");
    }

    #[test]
    fn different_scopes_never_match() {
        let s1 = scope("u1");
        let s2 = scope("u2");
        assert!(!s1.matches(&s2));
    }
}
