//! Admin-panel resource engine.
//!
//! Resources declare fields, filters, lenses and actions; the engine
//! resolves them per request context, authorizes every step against the
//! registered policies, and drives listings and bulk operations through a
//! `RecordStore`.

pub mod action;
pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod filter;
pub mod lens;
pub mod panel;
pub mod pipeline;
pub mod query;
pub mod record;
pub mod registry;
pub mod request;
pub mod resource;
pub mod schema;
pub mod store;
pub mod types;
pub mod validation;

pub use engine::{AdminEngine, DetailView, FormView, IndexPage, IndexRow};
pub use error::EngineError;
pub use registry::Registry;
pub use request::AdminRequest;
pub use resource::{Resource, ResourceDefinition};
