use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ptw_core::{AppError, AppResult, NonEmptyString, WorkspaceRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable template identifier shared by every version of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(Uuid);

impl TemplateId {
    /// Creates a random template identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a template identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a transport value into a template identifier.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value).map(Self).map_err(|error| {
            AppError::Validation(format!("invalid template id '{value}': {error}"))
        })
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TemplateId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Reference to one immutable template snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Template identifier.
    pub template_id: TemplateId,
    /// Snapshot version, starting at 1.
    pub version: i32,
}

/// One ordered step in a template's approval chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// Position in the chain; lower runs first.
    pub order: i32,
    /// Role that must approve this step.
    pub role: WorkspaceRole,
    /// Optional steps are advisory and never block completion.
    pub required: bool,
}

/// Whether an unmet gate halts the workflow or only warns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Refuse the action.
    Block,
    /// Record a warning and continue.
    #[default]
    Warn,
}

impl GateMode {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Warn => "warn",
        }
    }
}

impl FromStr for GateMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "block" => Ok(Self::Block),
            "warn" => Ok(Self::Warn),
            _ => Err(AppError::Validation(format!("unknown gate mode '{value}'"))),
        }
    }
}

/// Qualification types a contractor must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QualificationGate {
    /// Gate mode.
    #[serde(default)]
    pub mode: GateMode,
    /// Required qualification type identifiers.
    #[serde(default)]
    pub required_qualification_type_ids: Vec<String>,
}

/// Training modules a contractor must have completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrainingGate {
    /// Gate mode.
    #[serde(default)]
    pub mode: GateMode,
    /// Required training module identifiers.
    #[serde(default)]
    pub required_module_ids: Vec<String>,
}

/// Immutable snapshot of a permit template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitTemplate {
    reference: TemplateRef,
    name: NonEmptyString,
    approval_steps: Vec<ApprovalStep>,
    qualification_gate: Option<QualificationGate>,
    training_gate: Option<TrainingGate>,
}

/// Input payload used to construct a validated template snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitTemplateInput {
    /// Template identifier.
    pub template_id: TemplateId,
    /// Snapshot version.
    pub version: i32,
    /// Display name.
    pub name: String,
    /// Approval steps in any order.
    pub approval_steps: Vec<ApprovalStep>,
    /// Optional qualification gate.
    pub qualification_gate: Option<QualificationGate>,
    /// Optional training gate.
    pub training_gate: Option<TrainingGate>,
}

impl PermitTemplate {
    /// Creates a validated template snapshot with steps sorted by order.
    pub fn new(input: PermitTemplateInput) -> AppResult<Self> {
        let PermitTemplateInput {
            template_id,
            version,
            name,
            mut approval_steps,
            qualification_gate,
            training_gate,
        } = input;

        if version < 1 {
            return Err(AppError::Validation(
                "template version must be at least 1".to_owned(),
            ));
        }

        let mut seen_orders = BTreeSet::new();
        for step in &approval_steps {
            if !seen_orders.insert(step.order) {
                return Err(AppError::Validation(format!(
                    "approval step order {} is used more than once",
                    step.order
                )));
            }
        }
        // An empty list means the implicit approver step; a list of only
        // optional steps would silently fall back to it.
        if !approval_steps.is_empty() && !approval_steps.iter().any(|step| step.required) {
            return Err(AppError::Validation(
                "at least one approval step must be required".to_owned(),
            ));
        }
        approval_steps.sort_by_key(|step| step.order);

        Ok(Self {
            reference: TemplateRef {
                template_id,
                version,
            },
            name: NonEmptyString::for_field("name", name)?,
            approval_steps,
            qualification_gate: qualification_gate.map(|gate| QualificationGate {
                mode: gate.mode,
                required_qualification_type_ids: normalize_ids(
                    gate.required_qualification_type_ids,
                ),
            }),
            training_gate: training_gate.map(|gate| TrainingGate {
                mode: gate.mode,
                required_module_ids: normalize_ids(gate.required_module_ids),
            }),
        })
    }

    /// Returns the snapshot reference.
    #[must_use]
    pub fn reference(&self) -> TemplateRef {
        self.reference
    }

    /// Returns the template display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns approval steps sorted by order.
    #[must_use]
    pub fn approval_steps(&self) -> &[ApprovalStep] {
        self.approval_steps.as_slice()
    }

    /// Returns the qualification gate, if configured.
    #[must_use]
    pub fn qualification_gate(&self) -> Option<&QualificationGate> {
        self.qualification_gate.as_ref()
    }

    /// Returns the training gate, if configured.
    #[must_use]
    pub fn training_gate(&self) -> Option<&TrainingGate> {
        self.training_gate.as_ref()
    }
}

fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Approval chain a permit must complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalPlan {
    /// Permit has no template, or its template lists no steps:
    /// one implicit `approver` step.
    NoTemplate,
    /// Ordered roles from the template's required steps.
    Steps {
        /// Roles in approval order.
        roles: Vec<WorkspaceRole>,
    },
}

impl ApprovalPlan {
    /// Derives the plan for an optional template snapshot.
    #[must_use]
    pub fn for_template(template: Option<&PermitTemplate>) -> Self {
        let roles: Vec<WorkspaceRole> = template
            .map(|template| {
                template
                    .approval_steps()
                    .iter()
                    .filter(|step| step.required)
                    .map(|step| step.role)
                    .collect()
            })
            .unwrap_or_default();

        if roles.is_empty() {
            Self::NoTemplate
        } else {
            Self::Steps { roles }
        }
    }

    /// Returns the ordered roles of the chain.
    #[must_use]
    pub fn roles(&self) -> &[WorkspaceRole] {
        match self {
            Self::NoTemplate => &[WorkspaceRole::Approver],
            Self::Steps { roles } => roles.as_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ptw_core::{AppError, WorkspaceRole};

    use super::{
        ApprovalPlan, ApprovalStep, GateMode, PermitTemplate, PermitTemplateInput,
        QualificationGate, TemplateId,
    };

    fn input(steps: Vec<ApprovalStep>) -> PermitTemplateInput {
        PermitTemplateInput {
            template_id: TemplateId::new(),
            version: 1,
            name: "Hot work".to_owned(),
            approval_steps: steps,
            qualification_gate: None,
            training_gate: None,
        }
    }

    fn step(order: i32, role: WorkspaceRole, required: bool) -> ApprovalStep {
        ApprovalStep {
            order,
            role,
            required,
        }
    }

    #[test]
    fn steps_are_sorted_by_order() {
        let template = PermitTemplate::new(input(vec![
            step(2, WorkspaceRole::Admin, true),
            step(1, WorkspaceRole::Approver, true),
        ]))
        .unwrap_or_else(|_| unreachable!());

        let roles: Vec<WorkspaceRole> = template.approval_steps().iter().map(|s| s.role).collect();
        assert_eq!(roles, vec![WorkspaceRole::Approver, WorkspaceRole::Admin]);
    }

    #[test]
    fn duplicate_step_orders_are_rejected() {
        let result = PermitTemplate::new(input(vec![
            step(1, WorkspaceRole::Approver, true),
            step(1, WorkspaceRole::Admin, true),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn gate_ids_are_trimmed_and_deduplicated() {
        let mut template_input = input(Vec::new());
        template_input.qualification_gate = Some(QualificationGate {
            mode: GateMode::Block,
            required_qualification_type_ids: vec![
                " q1 ".to_owned(),
                "q1".to_owned(),
                String::new(),
                "q2".to_owned(),
            ],
        });
        let template = PermitTemplate::new(template_input).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            template
                .qualification_gate()
                .map(|gate| gate.required_qualification_type_ids.clone()),
            Some(vec!["q1".to_owned(), "q2".to_owned()])
        );
    }

    #[test]
    fn missing_template_is_an_implicit_approver_step() {
        let plan = ApprovalPlan::for_template(None);
        assert_eq!(plan, ApprovalPlan::NoTemplate);
        assert_eq!(plan.roles(), &[WorkspaceRole::Approver]);
    }

    #[test]
    fn optional_steps_are_left_out_of_the_plan() {
        let template = PermitTemplate::new(input(vec![
            step(1, WorkspaceRole::Approver, true),
            step(2, WorkspaceRole::Viewer, false),
            step(3, WorkspaceRole::Admin, true),
        ]))
        .unwrap_or_else(|_| unreachable!());

        let plan = ApprovalPlan::for_template(Some(&template));
        assert_eq!(plan.roles(), &[WorkspaceRole::Approver, WorkspaceRole::Admin]);
    }

    #[test]
    fn templates_need_a_required_step_once_steps_are_listed() {
        let all_optional = PermitTemplate::new(input(vec![
            step(1, WorkspaceRole::Approver, false),
            step(2, WorkspaceRole::Admin, false),
        ]));
        assert!(matches!(all_optional, Err(AppError::Validation(_))));

        let no_steps = PermitTemplate::new(input(Vec::new())).unwrap_or_else(|_| unreachable!());
        assert_eq!(
            ApprovalPlan::for_template(Some(&no_steps)),
            ApprovalPlan::NoTemplate
        );
    }
}
