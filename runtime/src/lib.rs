//! ocistow runtime - the copy-and-sign engine.
//!
//! This crate provides OCI reference parsing, registry I/O, image
//! mutation, signature production and attachment, the backends that supply
//! signer and transport, and the [`Service`] that ties them together.

#![allow(clippy::result_large_err)]

pub mod backend;
pub mod oci;
pub mod service;
pub mod signing;
pub mod transport;

// Re-export common types
pub use backend::{Backend, LocalKeyBackend, MemoryBackend};
pub use oci::{
    CredentialStore, ImageContent, ImageReference, LayerBlob, MemoryRegistry, OciRegistry,
    Registry, RegistryAuth, RegistryLogin, TransportOptions,
};
pub use service::{
    logging, tracing_spans, LoggingMiddleware, Service, ServiceBuilder, ServiceMiddleware,
    StowService, TracingMiddleware,
};
pub use signing::{
    generate_key, walk, DupeDetector, LocalKeySigner, Signature, SignedEntity, Signer,
    SimpleSigningPayload, Visitor,
};
pub use transport::{stow, StowFlags, StowRequest};

/// ocistow runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
