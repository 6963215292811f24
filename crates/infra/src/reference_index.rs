//! Tenant-scoped uniqueness for document references.
//!
//! Goods receipt/issue references, purchase request numbers, and invoice
//! numbers are unique per tenant. `claim` is insert-if-absent under a single
//! lock, so two concurrent creations of the same reference can never both
//! succeed. Flows release a claim if the document they were building fails.
//!
//! Persistent deployments back this with the `document_references` unique
//! index (see the Postgres event store DDL).

use std::collections::HashSet;
use std::sync::RwLock;

use harborerp_core::TenantId;

/// Namespace for a claimed reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    GoodsReceipt,
    GoodsIssue,
    PurchaseRequest,
    PurchaseInvoice,
}

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    claimed: RwLock<HashSet<(TenantId, ReferenceKind, String)>>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim a reference. Returns false if it is already taken.
    pub fn claim(&self, tenant_id: TenantId, kind: ReferenceKind, reference: &str) -> bool {
        match self.claimed.write() {
            Ok(mut set) => set.insert((tenant_id, kind, reference.to_string())),
            Err(_) => false,
        }
    }

    /// Release a claim (document creation failed after the claim).
    pub fn release(&self, tenant_id: TenantId, kind: ReferenceKind, reference: &str) {
        if let Ok(mut set) = self.claimed.write() {
            set.remove(&(tenant_id, kind, reference.to_string()));
        }
    }
}
