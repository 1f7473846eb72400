//! Duplicate signature detection.

use std::sync::Arc;

use super::signature::Signature;
use super::signer::Signer;

/// Decides whether a candidate signature is already attached.
///
/// ECDSA signatures are randomized, so re-signing an identical payload never
/// yields identical bytes. An existing signature therefore counts as a
/// duplicate when it is byte-equal to the candidate, or when it carries the
/// same payload and verifies under the detector's key.
#[derive(Clone)]
pub struct DupeDetector {
    signer: Arc<dyn Signer>,
}

impl DupeDetector {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn find_duplicate<'a>(
        &self,
        existing: &'a [Signature],
        candidate: &Signature,
    ) -> Option<&'a Signature> {
        existing.iter().find(|sig| self.is_duplicate(sig, candidate))
    }

    fn is_duplicate(&self, existing: &Signature, candidate: &Signature) -> bool {
        if existing == candidate {
            return true;
        }
        if existing.payload() != candidate.payload() {
            return false;
        }
        // Signatures made with some other key are kept but never match.
        match existing.signature_bytes() {
            Ok(raw) => self.signer.verify(existing.payload(), &raw).is_ok(),
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for DupeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DupeDetector").finish_non_exhaustive()
    }
}
