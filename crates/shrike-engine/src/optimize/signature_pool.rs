//! Concurrent set of method signatures

use crate::graph::MethodSignature;
use dashmap::DashSet;

/// Signatures already claimed in the program's virtual method space.
///
/// Shared by reference between collection workers; inserts are
/// insert-if-absent and safe from any thread.
#[derive(Debug, Default)]
pub struct SignaturePool {
    signatures: DashSet<MethodSignature>,
}

impl SignaturePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            signatures: DashSet::new(),
        }
    }

    /// Claim a signature. Returns false if it was already present.
    pub fn insert(&self, signature: MethodSignature) -> bool {
        self.signatures.insert(signature)
    }

    /// Whether the signature is claimed
    pub fn contains(&self, signature: &MethodSignature) -> bool {
        self.signatures.contains(signature)
    }

    /// Number of claimed signatures
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether nothing is claimed
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
