use ptw_application::PublishTemplateInput;
use ptw_core::AppError;
use ptw_domain::{
    ApprovalStep, GateMode, PermitTemplate, QualificationGate, TemplateId, TrainingGate,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload for publishing a template version.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "publish-template-request.ts")]
pub struct PublishTemplateRequest {
    /// Existing template to version; omitted to start a new template.
    #[serde(default)]
    pub template_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub approval_steps: Vec<ApprovalStepDto>,
    #[serde(default)]
    pub qualification_gate: Option<QualificationGateDto>,
    #[serde(default)]
    pub training_gate: Option<TrainingGateDto>,
}

/// One ordered approval step.
#[derive(Debug, Clone, Deserialize, Serialize, TS)]
#[ts(export, export_to = "approval-step-dto.ts")]
pub struct ApprovalStepDto {
    pub order: i32,
    pub role: String,
    /// Optional steps are not part of the chain; a non-empty list needs at
    /// least one required step.
    #[serde(default = "required_by_default")]
    pub required: bool,
}

/// Qualification gate definition.
#[derive(Debug, Clone, Deserialize, Serialize, TS)]
#[ts(export, export_to = "qualification-gate-dto.ts")]
pub struct QualificationGateDto {
    /// `block` or `warn` (default).
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub required_qualification_type_ids: Vec<String>,
}

/// Training gate definition.
#[derive(Debug, Clone, Deserialize, Serialize, TS)]
#[ts(export, export_to = "training-gate-dto.ts")]
pub struct TrainingGateDto {
    /// `block` or `warn` (default).
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub required_module_ids: Vec<String>,
}

/// API representation of an immutable template version.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "template-response.ts")]
pub struct TemplateResponse {
    pub template_id: String,
    pub version: i32,
    pub name: String,
    pub approval_steps: Vec<ApprovalStepDto>,
    pub qualification_gate: Option<QualificationGateDto>,
    pub training_gate: Option<TrainingGateDto>,
}

fn required_by_default() -> bool {
    true
}

fn parse_gate_mode(value: Option<&str>) -> Result<GateMode, AppError> {
    value.map_or(Ok(GateMode::default()), str::parse)
}

impl TryFrom<ApprovalStepDto> for ApprovalStep {
    type Error = AppError;

    fn try_from(value: ApprovalStepDto) -> Result<Self, Self::Error> {
        Ok(Self {
            order: value.order,
            role: value.role.parse()?,
            required: value.required,
        })
    }
}

impl TryFrom<PublishTemplateRequest> for PublishTemplateInput {
    type Error = AppError;

    fn try_from(value: PublishTemplateRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            template_id: value
                .template_id
                .as_deref()
                .map(TemplateId::parse)
                .transpose()?,
            name: value.name,
            approval_steps: value
                .approval_steps
                .into_iter()
                .map(ApprovalStep::try_from)
                .collect::<Result<_, _>>()?,
            qualification_gate: value
                .qualification_gate
                .map(|gate| {
                    Ok::<_, AppError>(QualificationGate {
                        mode: parse_gate_mode(gate.mode.as_deref())?,
                        required_qualification_type_ids: gate.required_qualification_type_ids,
                    })
                })
                .transpose()?,
            training_gate: value
                .training_gate
                .map(|gate| {
                    Ok::<_, AppError>(TrainingGate {
                        mode: parse_gate_mode(gate.mode.as_deref())?,
                        required_module_ids: gate.required_module_ids,
                    })
                })
                .transpose()?,
        })
    }
}

impl From<PermitTemplate> for TemplateResponse {
    fn from(value: PermitTemplate) -> Self {
        let reference = value.reference();
        Self {
            template_id: reference.template_id.to_string(),
            version: reference.version,
            name: value.name().as_str().to_owned(),
            approval_steps: value
                .approval_steps()
                .iter()
                .map(|step| ApprovalStepDto {
                    order: step.order,
                    role: step.role.as_str().to_owned(),
                    required: step.required,
                })
                .collect(),
            qualification_gate: value.qualification_gate().map(|gate| QualificationGateDto {
                mode: Some(gate.mode.as_str().to_owned()),
                required_qualification_type_ids: gate.required_qualification_type_ids.clone(),
            }),
            training_gate: value.training_gate().map(|gate| TrainingGateDto {
                mode: Some(gate.mode.as_str().to_owned()),
                required_module_ids: gate.required_module_ids.clone(),
            }),
        }
    }
}
