//! Chunked processing of selected records.
//!
//! Records are walked in primary-key order, one bounded chunk at a time.
//! Each chunk is authorized record by record; a chunk left with no
//! authorized record is skipped without calling the handler. Any handler
//! error aborts the remaining chunks.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Action, ActionContext, ActionResponse};
use crate::auth::Ability;
use crate::error::EngineError;
use crate::field::FieldCollection;
use crate::query::{Condition, FilterOp, Query, SortDirection, TrashedStatus};
use crate::record::Record;
use crate::registry::Registry;
use crate::request::AdminRequest;
use crate::resource::Resource;
use crate::store::{RecordStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub chunks: usize,
    /// Chunks with no authorized record
    pub skipped: usize,
    pub processed: usize,
    pub unauthorized: usize,
}

/// Walk `query` in chunks of `chunk_size` by ascending primary key.
pub fn chunk_by_key<A, H>(
    store: &dyn RecordStore,
    query: &Query,
    chunk_size: usize,
    mut authorize: A,
    mut handle: H,
) -> Result<BulkOutcome, EngineError>
where
    A: FnMut(&Record) -> bool,
    H: FnMut(Vec<Record>) -> Result<(), EngineError>,
{
    let size = chunk_size.max(1) as u64;
    let primary_key = query.primary_key().to_string();
    let base = query
        .clone()
        .clear_order()
        .without_limit()
        .order_by(primary_key.clone(), SortDirection::Asc);

    let mut outcome = BulkOutcome::default();
    let mut last: Option<Value> = None;
    loop {
        let mut page = base.clone();
        if let Some(last) = &last {
            page = page.and_where(Condition::new(primary_key.clone(), FilterOp::Gt, last.clone()));
        }
        let records = store.fetch(&page.limit(size, None))?;
        let fetched = records.len();
        if fetched == 0 {
            break;
        }
        last = records.last().and_then(|r| r.key(&primary_key)).cloned();
        outcome.chunks += 1;

        let (authorized, denied): (Vec<Record>, Vec<Record>) = records.into_iter().partition(|r| authorize(r));
        outcome.unauthorized += denied.len();
        if authorized.is_empty() {
            debug!("Skipping chunk {}: no authorized records", outcome.chunks);
            outcome.skipped += 1;
        } else {
            outcome.processed += authorized.len();
            handle(authorized)?;
        }

        if (fetched as u64) < size || last.is_none() {
            break;
        }
    }

    info!(
        "Processed {} record(s) of {} in {} chunk(s), {} skipped, {} unauthorized",
        outcome.processed,
        query.table(),
        outcome.chunks,
        outcome.skipped,
        outcome.unauthorized
    );
    Ok(outcome)
}

fn keys_of(records: &[Record], primary_key: &str) -> Vec<Value> {
    records.iter().filter_map(|r| r.key(primary_key).cloned()).collect()
}

/// Bulk delete, restore, force-delete, detach and action runs over a
/// selection query.
pub struct Bulk<'a> {
    registry: &'a Registry,
    store: &'a dyn RecordStore,
    chunk_size: usize,
}

impl<'a> Bulk<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn RecordStore, chunk_size: usize) -> Self {
        Self {
            registry,
            store,
            chunk_size,
        }
    }

    fn allowed(&self, resource: &Resource, req: &AdminRequest, record: &Record, ability: &Ability) -> bool {
        Resource::for_record(resource.definition().clone(), record.clone()).authorized_to(req, self.registry, ability)
    }

    /// Run deletable-field callbacks for each record before a hard delete
    fn release_storage(fields: &FieldCollection, records: &[Record]) -> Result<(), EngineError> {
        for record in records {
            for field in fields {
                field
                    .delete_stored(record)
                    .map_err(|e| StoreError::Backend(format!("{}: {}", field.attribute, e)))?;
            }
        }
        Ok(())
    }

    /// Soft-delete, or hard-delete for resources without soft deletes
    pub fn delete(&self, resource: &Resource, req: &AdminRequest, query: Query) -> Result<BulkOutcome, EngineError> {
        let definition = resource.definition().clone();
        let table = definition.table().to_string();
        let primary_key = definition.primary_key().to_string();
        let query = query.with_trashed(TrashedStatus::Default);

        if definition.soft_deletes() {
            let column = definition.soft_delete_column().to_string();
            let mut changes = Map::new();
            changes.insert(column, Value::String(Utc::now().to_rfc3339()));
            return chunk_by_key(
                self.store,
                &query,
                self.chunk_size,
                |r| self.allowed(resource, req, r, &Ability::Delete),
                |records| {
                    let keys = keys_of(&records, &primary_key);
                    self.store
                        .update(&table, &[Condition::in_list(primary_key.clone(), keys)], &changes)?;
                    Ok(())
                },
            );
        }

        let deletable = resource.deletable_fields(req);
        chunk_by_key(
            self.store,
            &query,
            self.chunk_size,
            |r| self.allowed(resource, req, r, &Ability::Delete),
            |records| {
                Self::release_storage(&deletable, &records)?;
                let keys = keys_of(&records, &primary_key);
                self.store.delete(&table, &[Condition::in_list(primary_key.clone(), keys)])?;
                Ok(())
            },
        )
    }

    pub fn restore(&self, resource: &Resource, req: &AdminRequest, query: Query) -> Result<BulkOutcome, EngineError> {
        let definition = resource.definition().clone();
        if !definition.soft_deletes() {
            return Err(EngineError::conflict(format!("{} does not soft delete", definition.key())));
        }
        let table = definition.table().to_string();
        let primary_key = definition.primary_key().to_string();
        let mut changes = Map::new();
        changes.insert(definition.soft_delete_column().to_string(), Value::Null);

        chunk_by_key(
            self.store,
            &query.with_trashed(TrashedStatus::Only),
            self.chunk_size,
            |r| self.allowed(resource, req, r, &Ability::Restore),
            |records| {
                let keys = keys_of(&records, &primary_key);
                self.store
                    .update(&table, &[Condition::in_list(primary_key.clone(), keys)], &changes)?;
                Ok(())
            },
        )
    }

    pub fn force_delete(&self, resource: &Resource, req: &AdminRequest, query: Query) -> Result<BulkOutcome, EngineError> {
        let definition = resource.definition().clone();
        let table = definition.table().to_string();
        let primary_key = definition.primary_key().to_string();
        let deletable = resource.deletable_fields(req);

        chunk_by_key(
            self.store,
            &query.with_trashed(TrashedStatus::With),
            self.chunk_size,
            |r| self.allowed(resource, req, r, &Ability::ForceDelete),
            |records| {
                Self::release_storage(&deletable, &records)?;
                let keys = keys_of(&records, &primary_key);
                self.store.delete(&table, &[Condition::in_list(primary_key.clone(), keys)])?;
                Ok(())
            },
        )
    }

    /// Remove join rows between the via-relationship parent and the
    /// selected records of `resource`.
    pub fn detach(&self, resource: &Resource, req: &AdminRequest, query: Query) -> Result<BulkOutcome, EngineError> {
        let Some(via) = &req.via else {
            return Err(EngineError::conflict("Detaching requires a parent relationship"));
        };
        let parent_definition = self.registry.resolve(&via.resource)?;
        let field = Resource::new(parent_definition.clone()).relatable_field(req, &via.relationship)?;
        let relation = match field.relation() {
            Some(relation) if field.is_belongs_to_many() => relation.clone(),
            _ => {
                return Err(EngineError::conflict(format!(
                    "{} on {} is not a many-to-many relationship",
                    via.relationship, via.resource
                )))
            }
        };

        let parent = self
            .store
            .find(&parent_definition.base_query()?.with_trashed(TrashedStatus::With), &via.resource_id)?
            .ok_or_else(|| EngineError::not_found(format!("{} {} not found", via.resource, via.resource_id)))?;
        let parent_resource = Resource::for_record(parent_definition.clone(), parent.clone());
        let ability = Ability::Detach(resource.key().to_string());
        let parent_value = parent
            .key(relation.owner_key(parent_definition.primary_key()))
            .cloned()
            .unwrap_or(Value::Null);

        let pivot_table = relation.pivot_table(&via.resource);
        let parent_column = relation.foreign_pivot_key(&via.resource);
        let related_column = relation.related_pivot_key();
        let primary_key = resource.definition().primary_key().to_string();

        chunk_by_key(
            self.store,
            &query,
            self.chunk_size,
            |_| parent_resource.authorized_to(req, self.registry, &ability),
            |records| {
                let keys = keys_of(&records, &primary_key);
                self.store.delete(
                    &pivot_table,
                    &[
                        Condition::eq(parent_column.clone(), parent_value.clone()),
                        Condition::in_list(related_column.clone(), keys),
                    ],
                )?;
                Ok(())
            },
        )
    }

    /// Run `action` over the selection. The response of the last handled
    /// chunk is returned; standalone actions run once with no records.
    pub fn run_action(
        &self,
        resource: &Resource,
        req: &AdminRequest,
        action: &dyn Action,
        query: Query,
        fields: Map<String, Value>,
    ) -> Result<(BulkOutcome, ActionResponse), EngineError> {
        let ctx = ActionContext {
            req,
            resource: resource.definition().as_ref(),
            fields,
            store: self.store,
        };

        if action.is_standalone() {
            info!("Running standalone action {} on {}", action.key(), resource.key());
            let response = action.handle(&ctx, vec![])?;
            return Ok((BulkOutcome::default(), response));
        }

        let run_ability = if action.is_destructive() {
            Ability::RunDestructiveAction(action.key().to_string())
        } else {
            Ability::RunAction(action.key().to_string())
        };

        let mut response = ActionResponse::None;
        let outcome = chunk_by_key(
            self.store,
            &query,
            action.chunk_size().min(self.chunk_size.max(1)),
            |record| {
                action.authorized_to_run(req, record)
                    && self.allowed(resource, req, record, &run_ability)
                    && (!action.is_destructive() || self.allowed(resource, req, record, &Ability::Delete))
            },
            |records| {
                debug!("Action {} handling {} record(s)", action.key(), records.len());
                response = action.handle(&ctx, records)?;
                Ok(())
            },
        )?;
        Ok((outcome, response))
    }
}
