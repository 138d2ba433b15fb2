#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Memory Core
//!
//! Typed property graph, hybrid retrieval, and tiered memory primitives for
//! a cognitive memory service.
//!
//! ## Core Concepts
//!
//! - **Graph**: a typed property graph of nodes and edges, with
//!   constitutive edges protected from unilateral deletion.
//! - **Decay**: Ebbinghaus-curve relevance decay and the Integrative
//!   Evaluation Function (IEF) that fuses relevance, similarity, recency,
//!   and constitutive weight into a single ranking score.
//! - **Hybrid retrieval**: semantic, keyword, and graph search channels
//!   fused with reciprocal rank fusion.
//! - **Working memory**: a bounded, capacity-limited buffer with
//!   LRU-plus-importance-floor eviction.
//! - **Tenancy**: project-scoped multi-tenant isolation with explicit
//!   cross-project read grants.
//!
//! ## Module Organization
//!
//! - [`types`]: the data model (`Node`, `Edge`, `Properties`, and the
//!   tiered-memory record types).
//! - [`graph`]: upsert, traversal, pathfinding, and the constitutive
//!   deletion guard's pure decision logic.
//! - [`decay`]: relevance decay, recency boost, cosine similarity, and IEF.
//! - [`sector`]: memory-sector classification.
//! - [`working_memory`]: the bounded working-memory buffer.
//! - [`audit`]: constitutive-edge deletion guard and its audit trail.
//! - [`hybrid`]: entity extraction, query routing, and RRF fusion.
//! - [`nuance`]: dissonance review tracking and resolution.
//! - [`tenancy`]: project-scoped access control.
//! - [`embeddings`]: the embedding-provider abstraction.
//! - [`storage`]: storage-adapter traits implemented by the backend crates.
//! - [`config`]: environment-driven runtime configuration.
//! - [`error`]: the crate-wide error type.

pub mod audit;
pub mod config;
pub mod constants;
pub mod decay;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod hybrid;
pub mod nuance;
pub mod sector;
pub mod storage;
pub mod tenancy;
pub mod types;
pub mod working_memory;

pub use error::{Error, Result};
pub use types::{Edge, Node, Properties, PropertyValue};
