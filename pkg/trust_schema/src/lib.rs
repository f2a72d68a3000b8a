//! A trust-schema engine: a bespoke name-pattern language, a schema
//! document interpreter built on top of it, a certificate cache, an async
//! packet validator, and a signing planner that walks the schema to
//! materialize a key chain.
//!
//! Certificate parsing, wire encoding, and the cryptographic operations
//! themselves are outside this crate's scope — see [`external`] for the
//! traits it expects an embedder to supply.

pub mod anchor;
pub mod anchor_container;
pub mod cache;
pub mod config;
pub mod doc;
pub mod error;
pub mod external;
pub mod hash;
pub mod name;
pub mod pattern;
pub mod planner;
pub mod rule;
pub mod schema;
pub mod sig_req;
pub mod timestamp;
pub mod validator;

pub use error::{Result, SchemaError};
pub use name::{Component, Name};
