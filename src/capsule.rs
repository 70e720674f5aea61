//! Content-addressed init image loader (external collaborator, spec.md
//! §1). A deliberately small stand-in for the original source's capsule
//! architecture (`capsule.h`): a capsule is an immutable payload whose
//! identity is its own content hash. Capsule directories, revocation
//! policy, and Mama/child birth eligibility are kernel-resident
//! concerns this crate's Non-goals exclude (multi-host coordination) —
//! what survives here is the one invariant this crate's hooks and VM
//! genuinely need a caller to uphold: an init image is validated before
//! any of its words are registered.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{PhysicsError, Result};

/// A loaded, content-addressed init capsule.
#[derive(Debug, Clone)]
pub struct Capsule {
    /// Content hash of `payload`; this capsule's identity.
    pub id: u64,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Capsule {
    /// Loads a capsule from `bytes`, computing its content hash.
    pub fn load(bytes: &[u8]) -> Capsule {
        Capsule {
            id: content_hash(bytes),
            payload: bytes.to_vec(),
        }
    }

    /// Loads a capsule and verifies it matches a previously recorded
    /// `expected_id` — the way a corrupted or tampered init image is
    /// caught before any word in it is registered.
    pub fn load_verified(bytes: &[u8], expected_id: u64) -> Result<Capsule> {
        let capsule = Capsule::load(bytes);
        if capsule.id != expected_id {
            return Err(PhysicsError::CapsuleLoad(format!(
                "content hash mismatch: expected {expected_id:#018x}, got {:#018x}",
                capsule.id
            )));
        }
        Ok(capsule)
    }

    /// Decodes the payload into a flat list of NUL-separated word names
    /// — the simplest wire format this stand-in loader supports. A real
    /// capsule payload would carry full colon-definition bodies; this
    /// crate only needs enough to hand `interpreter::Interpreter` a
    /// realistic set of names to define.
    pub fn decode_word_names(&self) -> Vec<Vec<u8>> {
        self.payload.split(|&b| b == 0).filter(|s| !s.is_empty()).map(|s| s.to_vec()).collect()
    }
}

fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}
