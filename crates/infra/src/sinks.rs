//! External collaborator interfaces.
//!
//! Projects, assets, and notifications live outside this core. Invoice
//! approval pushes cost data to them through these seams; deployments plug
//! in real clients, tests and the default wiring use the recording
//! implementations. Delivery is after-commit and therefore at-least-once.

use std::sync::Mutex;

use rust_decimal::Decimal;

use harborerp_core::{AssetInstanceId, ProjectId, TenantId};

/// Receives actual-cost postings for projects.
pub trait ProjectCostSink: Send + Sync {
    fn add_actual_cost(&self, tenant_id: TenantId, project_id: ProjectId, amount: Decimal);
}

/// Receives maintenance records for asset instances.
pub trait AssetMaintenanceSink: Send + Sync {
    fn create_maintenance_record(
        &self,
        tenant_id: TenantId,
        asset_instance_id: AssetInstanceId,
        cost: Decimal,
        invoice_ref: &str,
    );
}

/// A cost posting captured by the recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCost {
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub amount: Decimal,
}

/// In-memory project cost sink (dev/test wiring).
#[derive(Debug, Default)]
pub struct RecordingProjectCostSink {
    inner: Mutex<Vec<RecordedCost>>,
}

impl RecordingProjectCostSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<RecordedCost> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ProjectCostSink for RecordingProjectCostSink {
    fn add_actual_cost(&self, tenant_id: TenantId, project_id: ProjectId, amount: Decimal) {
        tracing::info!(%tenant_id, %project_id, %amount, "project actual cost posted");
        if let Ok(mut inner) = self.inner.lock() {
            inner.push(RecordedCost {
                tenant_id,
                project_id,
                amount,
            });
        }
    }
}

/// A maintenance record captured by the recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMaintenance {
    pub tenant_id: TenantId,
    pub asset_instance_id: AssetInstanceId,
    pub cost: Decimal,
    pub invoice_ref: String,
}

/// In-memory asset maintenance sink (dev/test wiring).
#[derive(Debug, Default)]
pub struct RecordingAssetMaintenanceSink {
    inner: Mutex<Vec<RecordedMaintenance>>,
}

impl RecordingAssetMaintenanceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<RecordedMaintenance> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl AssetMaintenanceSink for RecordingAssetMaintenanceSink {
    fn create_maintenance_record(
        &self,
        tenant_id: TenantId,
        asset_instance_id: AssetInstanceId,
        cost: Decimal,
        invoice_ref: &str,
    ) {
        tracing::info!(%tenant_id, %asset_instance_id, %cost, invoice_ref, "asset maintenance record created");
        if let Ok(mut inner) = self.inner.lock() {
            inner.push(RecordedMaintenance {
                tenant_id,
                asset_instance_id,
                cost,
                invoice_ref: invoice_ref.to_string(),
            });
        }
    }
}
