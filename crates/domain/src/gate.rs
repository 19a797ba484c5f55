use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::template::{GateMode, QualificationGate, TrainingGate};

/// Contractor credential record evaluated by the qualification gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationRecord {
    /// Qualification type identifier.
    pub qualification_type_id: String,
    /// Expiry date; `None` never expires.
    pub expiry_date: Option<NaiveDate>,
    /// Whether an administrator waived the expiry.
    pub waived: bool,
    /// Last day the waiver applies; `None` waives indefinitely.
    pub waived_until: Option<NaiveDate>,
}

impl QualificationRecord {
    /// Returns whether the record satisfies its type on `today`.
    #[must_use]
    pub fn covers(&self, today: NaiveDate) -> bool {
        let unexpired = self.expiry_date.is_none_or(|expiry| expiry >= today);
        let waiver_active = self.waived && self.waived_until.is_none_or(|until| until >= today);
        unexpired || waiver_active
    }
}

/// Completed training module for a contractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingCompletion {
    /// Training module identifier.
    pub module_id: String,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}

/// Result of evaluating one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GateEvaluation {
    /// Whether the action must be refused.
    pub blocked: bool,
    /// Human-readable reason when anything is missing.
    pub reason: Option<String>,
    /// Required identifiers without a satisfying record, in gate order.
    pub missing_ids: Vec<String>,
}

impl GateEvaluation {
    /// Returns a passing evaluation.
    #[must_use]
    pub fn passed() -> Self {
        Self::default()
    }

    /// Returns the warning text for a non-blocking miss.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        if self.blocked {
            return None;
        }

        self.reason.as_deref()
    }
}

/// Evaluates a qualification gate against a contractor's records on `today`.
#[must_use]
pub fn evaluate_qualification_gate(
    gate: Option<&QualificationGate>,
    records: &[QualificationRecord],
    today: NaiveDate,
) -> GateEvaluation {
    let Some(gate) = gate else {
        return GateEvaluation::passed();
    };

    evaluate(
        gate.mode,
        &gate.required_qualification_type_ids,
        "qualifications",
        |required_id| {
            records.iter().any(|record| {
                record.qualification_type_id == required_id && record.covers(today)
            })
        },
    )
}

/// Evaluates a training gate against a contractor's completed modules.
#[must_use]
pub fn evaluate_training_gate(
    gate: Option<&TrainingGate>,
    completions: &[TrainingCompletion],
) -> GateEvaluation {
    let Some(gate) = gate else {
        return GateEvaluation::passed();
    };

    evaluate(
        gate.mode,
        &gate.required_module_ids,
        "training modules",
        |required_id| {
            completions
                .iter()
                .any(|completion| completion.module_id == required_id)
        },
    )
}

fn evaluate(
    mode: GateMode,
    required_ids: &[String],
    noun: &str,
    is_satisfied: impl Fn(&str) -> bool,
) -> GateEvaluation {
    let missing_ids: Vec<String> = required_ids
        .iter()
        .filter(|required_id| !is_satisfied(required_id.as_str()))
        .cloned()
        .collect();

    if missing_ids.is_empty() {
        return GateEvaluation::passed();
    }

    let listed = missing_ids.join(", ");
    match mode {
        GateMode::Block => GateEvaluation {
            blocked: true,
            reason: Some(format!("missing {noun}: {listed}")),
            missing_ids,
        },
        GateMode::Warn => GateEvaluation {
            blocked: false,
            reason: Some(format!("warning: missing {noun} {listed}")),
            missing_ids,
        },
    }
}
