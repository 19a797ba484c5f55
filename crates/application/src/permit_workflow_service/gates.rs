use ptw_domain::{evaluate_qualification_gate, evaluate_training_gate};

use super::*;

#[derive(Debug, Default)]
pub(super) struct GateReport {
    pub(super) block: Option<GateBlock>,
    pub(super) warnings: Vec<String>,
}

#[derive(Debug)]
pub(super) struct GateBlock {
    pub(super) reason: String,
    missing_qualification_ids: Vec<String>,
    missing_training_module_ids: Vec<String>,
}

impl GateBlock {
    pub(super) fn audit_payload(&self) -> Value {
        json!({
            "reason": self.reason,
            "missing_qualification_ids": self.missing_qualification_ids,
            "missing_training_module_ids": self.missing_training_module_ids,
        })
    }
}

impl PermitWorkflowService {
    /// Runs both eligibility gates for the permit's contractor.
    ///
    /// A permit without a contractor has no credentials, so every required
    /// identifier counts as missing.
    pub(super) async fn evaluate_gates(
        &self,
        permit: &Permit,
        template: Option<&PermitTemplate>,
    ) -> AppResult<GateReport> {
        let Some(template) = template else {
            return Ok(GateReport::default());
        };

        let contractor_id = permit.metadata.contractor_id.as_deref();
        let qualification_gate = template
            .qualification_gate()
            .filter(|gate| !gate.required_qualification_type_ids.is_empty());
        let training_gate = template
            .training_gate()
            .filter(|gate| !gate.required_module_ids.is_empty());

        let records = match (qualification_gate, contractor_id) {
            (Some(_), Some(contractor_id)) => {
                self.credential_repository
                    .list_qualifications(permit.workspace_id, contractor_id)
                    .await?
            }
            _ => Vec::new(),
        };
        let completions = match (training_gate, contractor_id) {
            (Some(_), Some(contractor_id)) => {
                self.credential_repository
                    .list_training_completions(permit.workspace_id, contractor_id)
                    .await?
            }
            _ => Vec::new(),
        };

        let qualification =
            evaluate_qualification_gate(qualification_gate, &records, self.clock.today());
        let training = evaluate_training_gate(training_gate, &completions);

        let mut report = GateReport::default();
        let blocking_reasons: Vec<String> = [&qualification, &training]
            .iter()
            .filter(|evaluation| evaluation.blocked)
            .filter_map(|evaluation| evaluation.reason.clone())
            .collect();
        report.warnings = [&qualification, &training]
            .iter()
            .filter_map(|evaluation| evaluation.warning().map(str::to_owned))
            .collect();

        if !blocking_reasons.is_empty() {
            report.block = Some(GateBlock {
                reason: blocking_reasons.join("; "),
                missing_qualification_ids: if qualification.blocked {
                    qualification.missing_ids
                } else {
                    Vec::new()
                },
                missing_training_module_ids: if training.blocked {
                    training.missing_ids
                } else {
                    Vec::new()
                },
            });
        }

        Ok(report)
    }
}
