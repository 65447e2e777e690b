//! Pivot (join row) fields of many-to-many relationships.
//!
//! The field declaring the relationship is located one of two ways:
//! - reached from the related side (listing `roles` via `users/3`): the
//!   parent's many-to-many fields that target this resource;
//! - reached from the owning side (attaching a role to `users/3`): this
//!   resource's own many-to-many fields that target the related resource.
//!
//! Either way the resulting pivot fields are spliced after the field that
//! references the other resource.

use tracing::debug;

use super::Resource;
use crate::error::EngineError;
use crate::field::{Field, FieldCollection};
use crate::registry::Registry;
use crate::request::AdminRequest;

/// Pick the relationship field among `candidates`: the only one, or the one
/// named `relationship`.
pub fn select_candidate(candidates: Vec<Field>, relationship: &str, describe: &str) -> Result<Option<Field>, EngineError> {
    match candidates.len() {
        0 => Ok(None),
        1 => Ok(candidates.into_iter().next()),
        n => match candidates.into_iter().find(|f| f.attribute == relationship) {
            Some(field) => Ok(Some(field)),
            None => Err(EngineError::configuration(format!(
                "Ambiguous pivot relationship on {}: {} candidate fields and none is named {}",
                describe, n, relationship
            ))),
        },
    }
}

/// Pivot fields declared by `source`, marked as pivot fields
pub fn pivot_fields_of(source: &Field, req: &AdminRequest) -> FieldCollection {
    let Some(callback) = source.relation().and_then(|r| r.pivot_fields()) else {
        return FieldCollection::default();
    };
    callback(req)
        .into_iter()
        .map(|mut field| {
            field.pivot = true;
            field
        })
        .collect()
}

impl Resource {
    /// The many-to-many field whose join row overlays this resource's
    /// records for the current request, if any.
    pub fn pivot_source(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        related_resource: &str,
    ) -> Result<Option<Field>, EngineError> {
        match &req.via {
            Some(via) if via.resource == related_resource => {
                let parent = Resource::new(registry.resolve(&via.resource)?);
                let candidates: Vec<Field> = parent
                    .available_fields(req)
                    .into_iter()
                    .filter(|f| f.is_belongs_to_many() && f.references_resource(self.key()))
                    .collect();
                select_candidate(candidates, &via.relationship, &via.resource)
            }
            _ => {
                let relationship = req
                    .related
                    .as_ref()
                    .map(|r| r.relationship.as_str())
                    .unwrap_or(related_resource);
                let candidates: Vec<Field> = self
                    .available_fields(req)
                    .into_iter()
                    .filter(|f| f.is_belongs_to_many() && f.references_resource(related_resource))
                    .collect();
                select_candidate(candidates, relationship, self.key())
            }
        }
    }

    /// Unfiltered pivot fields for the relationship with `related_resource`
    pub fn pivot_fields_for(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        related_resource: &str,
    ) -> Result<FieldCollection, EngineError> {
        Ok(match self.pivot_source(req, registry, related_resource)? {
            Some(source) => pivot_fields_of(&source, req),
            None => FieldCollection::default(),
        })
    }

    /// Splice the via-relationship pivot fields into `fields` right after
    /// the field referencing the parent resource, or at the end.
    pub fn splice_pivot_fields(
        &self,
        req: &AdminRequest,
        registry: &Registry,
        fields: FieldCollection,
    ) -> Result<FieldCollection, EngineError> {
        let Some(via) = &req.via else {
            return Ok(fields);
        };
        let pivot = self.pivot_fields_for(req, registry, &via.resource)?;
        if pivot.is_empty() {
            return Ok(fields);
        }

        let index = fields.position(|f| f.references_resource(&via.resource));
        debug!(
            "Splicing {} pivot field(s) into {} {}",
            pivot.len(),
            self.key(),
            match index {
                Some(i) => format!("after position {}", i),
                None => "at the end".to_string(),
            }
        );
        Ok(fields.insert_after(index, pivot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_single_or_named_candidate() {
        let one = vec![Field::belongs_to_many("Roles", "roles", "roles")];
        assert_eq!(select_candidate(one, "other", "users").unwrap().unwrap().attribute, "roles");

        let two = vec![
            Field::belongs_to_many("Roles", "roles", "roles"),
            Field::belongs_to_many("Past Roles", "past_roles", "roles"),
        ];
        assert_eq!(
            select_candidate(two.clone(), "past_roles", "users").unwrap().unwrap().attribute,
            "past_roles"
        );
        assert!(matches!(
            select_candidate(two, "missing", "users"),
            Err(EngineError::Configuration(_))
        ));
        assert!(select_candidate(vec![], "roles", "users").unwrap().is_none());
    }
}
