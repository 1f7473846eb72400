//! Signature production and attachment.
//!
//! A [`Signer`] signs [`SimpleSigningPayload`] bytes; the result becomes a
//! [`Signature`] that is attached to a [`SignedEntity`] unless the
//! [`DupeDetector`] finds an equivalent one already there.

pub mod dedup;
pub mod entity;
pub mod payload;
pub mod signature;
pub mod signer;

pub use dedup::DupeDetector;
pub use entity::{walk, SignedEntity, SignedImage, SignedIndex, Visitor};
pub use payload::{SimpleSigningPayload, SIMPLE_SIGNING_TYPE};
pub use signature::{Signature, SIGNATURE_ANNOTATION, SIMPLE_SIGNING_MEDIA_TYPE};
pub use signer::{generate_key, LocalKeySigner, Signer};
