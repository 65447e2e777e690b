//! Authorization gate.
//!
//! Policies answer per ability with `Some(allow)` or `None` when they do not
//! declare the ability. The gate turns that into a decision: undeclared
//! relationship and action abilities are allowed, undeclared CRUD abilities
//! are denied, and a resource without any policy is fully authorized.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config;
use crate::error::EngineError;
use crate::record::Record;

/// The user a request is evaluated for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub roles: BTreeSet<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn guest() -> Self {
        Self::new("guest")
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ability {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
    Restore,
    ForceDelete,
    /// Create a related record of the named resource from this one
    Add(String),
    AttachAny(String),
    Attach(String),
    Detach(String),
    RunAction(String),
    RunDestructiveAction(String),
}

impl Ability {
    /// Policy lookup name, e.g. `update` or `attachAny:roles`
    pub fn name(&self) -> String {
        match self {
            Ability::ViewAny => "viewAny".to_string(),
            Ability::View => "view".to_string(),
            Ability::Create => "create".to_string(),
            Ability::Update => "update".to_string(),
            Ability::Delete => "delete".to_string(),
            Ability::Restore => "restore".to_string(),
            Ability::ForceDelete => "forceDelete".to_string(),
            Ability::Add(related) => format!("add:{}", related),
            Ability::AttachAny(related) => format!("attachAny:{}", related),
            Ability::Attach(related) => format!("attach:{}", related),
            Ability::Detach(related) => format!("detach:{}", related),
            Ability::RunAction(action) => format!("runAction:{}", action),
            Ability::RunDestructiveAction(action) => format!("runDestructiveAction:{}", action),
        }
    }

    /// Family name without the target, e.g. `attachAny`
    pub fn family(&self) -> &'static str {
        match self {
            Ability::ViewAny => "viewAny",
            Ability::View => "view",
            Ability::Create => "create",
            Ability::Update => "update",
            Ability::Delete => "delete",
            Ability::Restore => "restore",
            Ability::ForceDelete => "forceDelete",
            Ability::Add(_) => "add",
            Ability::AttachAny(_) => "attachAny",
            Ability::Attach(_) => "attach",
            Ability::Detach(_) => "detach",
            Ability::RunAction(_) => "runAction",
            Ability::RunDestructiveAction(_) => "runDestructiveAction",
        }
    }

    /// Decision when a policy exists but does not declare this ability
    pub fn allowed_when_undeclared(&self) -> bool {
        matches!(
            self,
            Ability::Add(_)
                | Ability::AttachAny(_)
                | Ability::Attach(_)
                | Ability::Detach(_)
                | Ability::RunAction(_)
                | Ability::RunDestructiveAction(_)
        )
    }

    pub fn parse(name: &str) -> Option<Self> {
        let (family, target) = match name.split_once(':') {
            Some((family, target)) => (family, Some(target.to_string())),
            None => (name, None),
        };
        Some(match (family, target) {
            ("viewAny", None) => Ability::ViewAny,
            ("view", None) => Ability::View,
            ("create", None) => Ability::Create,
            ("update", None) => Ability::Update,
            ("delete", None) => Ability::Delete,
            ("restore", None) => Ability::Restore,
            ("forceDelete", None) => Ability::ForceDelete,
            ("add", Some(t)) => Ability::Add(t),
            ("attachAny", Some(t)) => Ability::AttachAny(t),
            ("attach", Some(t)) => Ability::Attach(t),
            ("detach", Some(t)) => Ability::Detach(t),
            ("runAction", Some(t)) => Ability::RunAction(t),
            ("runDestructiveAction", Some(t)) => Ability::RunDestructiveAction(t),
            _ => return None,
        })
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// External policy store for one resource
pub trait Policy: Send + Sync {
    /// `None` when the policy does not declare `ability`
    fn check(&self, actor: &Actor, ability: &Ability, record: Option<&Record>) -> Option<bool>;
}

/// Ability name (`update`, `attachAny:roles`, or a bare family such as
/// `attach`) to the roles allowed. `*` allows every actor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolePolicy {
    abilities: HashMap<String, BTreeSet<String>>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow<I, S>(mut self, ability: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abilities
            .entry(ability.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        self
    }

    /// Declare `ability` with no allowed roles
    pub fn deny(mut self, ability: impl Into<String>) -> Self {
        self.abilities.entry(ability.into()).or_default();
        self
    }
}

impl Policy for RolePolicy {
    fn check(&self, actor: &Actor, ability: &Ability, _record: Option<&Record>) -> Option<bool> {
        let roles = self
            .abilities
            .get(&ability.name())
            .or_else(|| self.abilities.get(ability.family()))?;
        Some(roles.contains("*") || actor.roles.iter().any(|r| roles.contains(r)))
    }
}

/// Closure-backed policy
pub struct FnPolicy<F>(pub F);

impl<F> Policy for FnPolicy<F>
where
    F: Fn(&Actor, &Ability, Option<&Record>) -> Option<bool> + Send + Sync,
{
    fn check(&self, actor: &Actor, ability: &Ability, record: Option<&Record>) -> Option<bool> {
        (self.0)(actor, ability, record)
    }
}

/// Resolves abilities against the registered policies
#[derive(Clone, Default)]
pub struct Gate {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: impl Into<String>, policy: Arc<dyn Policy>) {
        self.policies.insert(resource.into(), policy);
    }

    pub fn has_policy(&self, resource: &str) -> bool {
        self.policies.contains_key(resource)
    }

    pub fn allows(&self, actor: &Actor, resource: &str, ability: &Ability, record: Option<&Record>) -> bool {
        let Some(policy) = self.policies.get(resource) else {
            return true;
        };
        let allowed = policy
            .check(actor, ability, record)
            .unwrap_or_else(|| ability.allowed_when_undeclared());

        if !allowed {
            if config::config().security.enable_audit_logging {
                info!("Denied {} on {} for actor {}", ability, resource, actor.id);
            } else {
                debug!("Denied {} on {} for actor {}", ability, resource, actor.id);
            }
        }
        allowed
    }

    pub fn authorize(&self, actor: &Actor, resource: &str, ability: &Ability, record: Option<&Record>) -> Result<(), EngineError> {
        if self.allows(actor, resource, ability, record) {
            Ok(())
        } else {
            Err(EngineError::forbidden(format!(
                "This action is unauthorized: {} on {}",
                ability, resource
            )))
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> Gate {
        let mut gate = Gate::new();
        gate.register(
            "posts",
            Arc::new(
                RolePolicy::new()
                    .allow("viewAny", ["*"])
                    .allow("update", ["editor"])
                    .deny("attachAny:tags"),
            ),
        );
        gate
    }

    #[test]
    fn resource_without_policy_is_open() {
        assert!(gate().allows(&Actor::guest(), "comments", &Ability::ForceDelete, None));
    }

    #[test]
    fn undeclared_crud_is_denied_but_relationships_allowed() {
        let gate = gate();
        let guest = Actor::guest();
        assert!(gate.allows(&guest, "posts", &Ability::ViewAny, None));
        assert!(!gate.allows(&guest, "posts", &Ability::Delete, None));
        assert!(gate.allows(&guest, "posts", &Ability::Attach("tags".into()), None));
        assert!(!gate.allows(&guest, "posts", &Ability::AttachAny("tags".into()), None));
    }

    #[test]
    fn roles_grant_declared_abilities() {
        let gate = gate();
        let editor = Actor::new("7").with_role("editor");
        assert!(gate.authorize(&editor, "posts", &Ability::Update, None).is_ok());
        assert!(matches!(
            gate.authorize(&Actor::guest(), "posts", &Ability::Update, None),
            Err(EngineError::Forbidden(_))
        ));
    }

    #[test]
    fn ability_names_round_trip() {
        for ability in [Ability::ViewAny, Ability::AttachAny("roles".into()), Ability::RunAction("publish".into())] {
            assert_eq!(Ability::parse(&ability.name()), Some(ability));
        }
        assert_eq!(Ability::parse("attach"), None);
    }
}
