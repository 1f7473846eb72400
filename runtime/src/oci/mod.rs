//! OCI registry plumbing.
//!
//! - Reference grammar and parsing
//! - Image content (manifest, config, layers) and its label/annotation mutation
//! - The [`Registry`] capability with network and in-memory implementations
//! - Per-registry credential store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      ┌───────────────────┐
//! │ ImageReference│ ───▶ │ dyn Registry      │
//! └──────────────┘      │  ├─ OciRegistry    │──▶ oci-distribution ──▶ registry
//!                       │  └─ MemoryRegistry │
//!                       └───────────────────┘
//!                                │
//!                                ▼
//!                         ImageContent (manifest + config + layers)
//! ```

pub mod credentials;
pub mod image;
pub mod memory;
pub mod reference;
pub mod registry;

pub use credentials::{CredentialStore, RegistryLogin};
pub use image::{sha256_digest, ImageContent, LayerBlob};
pub use memory::MemoryRegistry;
pub use reference::ImageReference;
pub use registry::{OciRegistry, Registry, RegistryAuth, TransportOptions};
