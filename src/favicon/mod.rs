//! Favicon discovery, decoding and multi-resolution caching
//!
//! Pipeline, leaves first: [`decoder`] and [`domain_cache`] have no
//! dependencies on the other stages, [`failure_ledger`] wraps a TTL store,
//! [`fetcher`] and [`discoverer`] talk to the network, [`selector`] ranks
//! candidates, [`cascade`] writes the size ladder and [`coordinator`] drives
//! the whole thing.

pub mod cascade;
pub mod coordinator;
pub mod decoder;
pub mod discoverer;
pub mod domain_cache;
pub mod failure_ledger;
pub mod fetcher;
pub mod models;
pub mod selector;

pub use cascade::{CascadeGenerator, CascadeOutcome};
pub use coordinator::{BatchReloadReport, FaviconCoordinator};
pub use decoder::{DecodedIcon, IconDecoder};
pub use discoverer::{Discovery, IconDiscoverer};
pub use domain_cache::{CASCADE_SIZES, DomainCache, StoreOutcome};
pub use failure_ledger::{FailureLedger, InMemoryTtlStore, TtlStore};
pub use fetcher::{HeadResponse, HttpResponse, IconFetcher, IconHttpClient, ReqwestIconClient};
pub use models::{CandidateIcon, ExtractionResult, FetchedIcon, IconSourceKind};
pub use selector::IconSelector;
