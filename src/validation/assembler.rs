use serde_json::Value;
use tracing::debug;

use super::{Rule, RuleSet, RESOURCE_ID_PLACEHOLDER};
use crate::error::EngineError;
use crate::field::FieldCollection;
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::resource::Resource;
use crate::types::RequestContext;

/// Derives the rule set of one form context from the fields resolved for
/// that context.
///
/// Readonly and unfillable fields never contribute rules. Named rules have
/// `{{resourceId}}` replaced with the key of the record being edited, or
/// `NULL` when there is none.
pub struct RuleAssembler<'a> {
    resource: &'a Resource,
    registry: &'a Registry,
}

impl<'a> RuleAssembler<'a> {
    pub fn new(resource: &'a Resource, registry: &'a Registry) -> Self {
        Self { resource, registry }
    }

    pub fn rules_for_creation(&self, req: &AdminRequest) -> RuleSet {
        let fields = self.resource.creation_fields(req, self.registry);
        self.assemble(req, fields, RequestContext::Create, RuleSet::new())
    }

    pub fn rules_for_update(&self, req: &AdminRequest) -> RuleSet {
        let fields = self.resource.update_fields(req, self.registry);
        self.assemble(req, fields, RequestContext::Update, RuleSet::new())
    }

    /// Rules for attaching a `related_resource` record through
    /// `relationship`: the related key itself plus the pivot fields.
    pub fn rules_for_attachment(
        &self,
        req: &AdminRequest,
        related_resource: &str,
        relationship: &str,
    ) -> Result<RuleSet, EngineError> {
        let base = self.relatable_rules(req, relationship, RequestContext::Attach)?;
        let fields = self
            .resource
            .creation_pivot_fields(req, self.registry, related_resource)?;
        Ok(self.assemble(req, fields, RequestContext::Attach, base))
    }

    pub fn rules_for_attachment_update(
        &self,
        req: &AdminRequest,
        related_resource: &str,
        relationship: &str,
        related: &Record,
    ) -> Result<RuleSet, EngineError> {
        let base = self.relatable_rules(req, relationship, RequestContext::UpdateAttached)?;
        let fields = self
            .resource
            .update_pivot_fields(req, self.registry, related_resource, related)?;
        Ok(self.assemble(req, fields, RequestContext::UpdateAttached, base))
    }

    fn relatable_rules(
        &self,
        req: &AdminRequest,
        relationship: &str,
        context: RequestContext,
    ) -> Result<RuleSet, EngineError> {
        let field = self.resource.relatable_field(req, relationship)?;
        let Some(relation) = field.relation() else {
            return Err(EngineError::conflict(format!("{} is not a relationship", relationship)));
        };
        let related = self.registry.resolve(&relation.resource)?;

        let mut rules = vec![
            Rule::named("required"),
            Rule::named(format!("exists:{},{}", related.table(), related.primary_key())),
        ];
        rules.extend(field.rules_for(context));

        let mut set = RuleSet::new();
        set.insert(field.attribute.clone(), rules);
        Ok(set)
    }

    fn assemble(&self, req: &AdminRequest, fields: FieldCollection, context: RequestContext, mut set: RuleSet) -> RuleSet {
        let replacement = self.resource_id(req);
        let fields = fields.without_readonly(req).without_unfillable();

        for field in &fields {
            let rules = field.rules_for(context);
            if rules.is_empty() {
                continue;
            }
            set.entry(field.attribute.clone())
                .or_default()
                .extend(rules.iter().map(|r| r.substitute(RESOURCE_ID_PLACEHOLDER, &replacement)));
        }

        debug!(
            "Assembled {} rule(s) for {} {}",
            set.values().map(Vec::len).sum::<usize>(),
            self.resource.key(),
            context
        );
        set
    }

    fn resource_id(&self, req: &AdminRequest) -> String {
        let id = req.resource_id.as_ref().or_else(|| self.resource.id());
        match id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "NULL".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Actor;
    use crate::field::{Field, FieldItem};
    use crate::resource::ResourceDefinition;
    use std::sync::Arc;

    struct Posts;

    impl ResourceDefinition for Posts {
        fn key(&self) -> &str {
            "posts"
        }

        fn fields(&self, _req: &AdminRequest) -> Vec<FieldItem> {
            vec![
                Field::id().into(),
                Field::text("Title", "title").rules(["required", "max:255"]).into(),
                Field::text("Slug", "slug")
                    .creation_rules(["unique:posts,slug"])
                    .update_rules(["unique:posts,slug,{{resourceId}}"])
                    .into(),
                Field::text("Locked", "locked").rules(["required"]).readonly().into(),
                Field::number("Views", "views").rules(["integer"]).unfillable().into(),
            ]
        }
    }

    fn resource() -> Resource {
        Resource::new(Arc::new(Posts))
    }

    #[test]
    fn creation_rules_skip_readonly_and_unfillable() {
        let registry = Registry::new();
        let resource = resource();
        let req = AdminRequest::new(Actor::guest(), "posts", RequestContext::Create);
        let rules = RuleAssembler::new(&resource, &registry).rules_for_creation(&req);

        assert_eq!(rules.keys().collect::<Vec<_>>(), vec!["slug", "title"]);
        assert_eq!(rules["slug"], vec![Rule::named("unique:posts,slug")]);
    }

    #[test]
    fn update_rules_substitute_the_record_key() {
        let registry = Registry::new();
        let resource = resource();
        let req = AdminRequest::new(Actor::guest(), "posts", RequestContext::Update).with_resource_id(7);
        let rules = RuleAssembler::new(&resource, &registry).rules_for_update(&req);
        assert_eq!(rules["slug"], vec![Rule::named("unique:posts,slug,7")]);
    }
}
