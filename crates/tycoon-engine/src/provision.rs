//! One-shot provisioning.
//!
//! Brings the entity to the point where the phased plan can take over:
//! the corporation exists and the first division exists. Both checks are
//! idempotent, so provisioning can be rerun safely.

use std::future::Future;

use tracing::info;
use tycoon_core::collaborator::{Collaborator, CollaboratorError};
use tycoon_types::{Action, ActionResponse};

use crate::bridge::HttpBridge;
use crate::error::EngineError;

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Corporation name, used only if it has to be created.
    pub corporation: String,
    /// Name of the first division.
    pub division: String,
    /// Industry of the first division.
    pub industry: String,
}

/// What provisioning changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// The corporation was created by this run.
    pub corporation_created: bool,
    /// The division was created by this run.
    pub division_created: bool,
}

/// A collaborator that can also found the corporation.
pub trait Provisioner: Collaborator {
    /// Create the corporation if absent. Returns whether it was created.
    fn ensure_corporation(
        &mut self,
        name: &str,
    ) -> impl Future<Output = Result<bool, CollaboratorError>> + Send;
}

impl Provisioner for HttpBridge {
    async fn ensure_corporation(&mut self, name: &str) -> Result<bool, CollaboratorError> {
        self.create_corporation(name).await
    }
}

/// Create the corporation and first division if either is missing.
pub async fn provision<P: Provisioner>(
    bridge: &mut P,
    request: &ProvisionRequest,
) -> Result<ProvisionReport, EngineError> {
    let mut report = ProvisionReport::default();

    report.corporation_created = bridge
        .ensure_corporation(&request.corporation)
        .await
        .map_err(|e| EngineError::Provision {
            message: format!("corporation: {e}"),
        })?;
    if report.corporation_created {
        info!(corporation = %request.corporation, "corporation created");
    } else {
        info!("corporation already exists");
    }

    let snapshot = bridge.snapshot().await.map_err(|e| EngineError::Provision {
        message: format!("snapshot: {e}"),
    })?;
    if snapshot.division(&request.division).is_some() {
        info!(division = %request.division, "division already exists");
        return Ok(report);
    }

    let action = Action::CreateDivision {
        division: request.division.clone(),
        industry: request.industry.clone(),
    };
    match bridge.attempt(&action).await {
        Ok(ActionResponse::Rejected { reason }) => Err(EngineError::Provision {
            message: format!("division {} rejected: {reason}", request.division),
        }),
        Ok(_) => {
            info!(division = %request.division, industry = %request.industry, "division created");
            report.division_created = true;
            Ok(report)
        }
        Err(e) => Err(EngineError::Provision {
            message: format!("division {}: {e}", request.division),
        }),
    }
}
