use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio::sync::Mutex;

use ptw_core::{ActorContext, AppError, AppResult, NonEmptyString, WorkspaceId, WorkspaceRole};
use ptw_domain::{
    ApprovalEvent, ApprovalStep, AuditAction, ChecklistItem, Permit, PermitId, PermitMetadata,
    PermitSource, PermitStatus, PermitTask, PermitTemplate, PermitTemplateInput,
    QualificationGate, QualificationRecord, ReminderSettings, TemplateId, TemplateRef,
    TrainingCompletion, TrainingGate,
};

use crate::credential_service::CredentialService;
use crate::notification_dispatcher::{DispatchMode, NotificationDispatcher, RetryPolicy};
use crate::notification_ports::{
    EmailMessage, EmailService, NotificationLogRepository, NotificationRecord, WorkspaceDirectory,
    WorkspaceSummary,
};
use crate::permit_ports::{
    ApprovalCommit, ApprovalCommitted, AuditEvent, AuditRepository, Clock, CredentialRepository,
    PermitRepository, StatusChangeCommit, TemplateRepository,
};
use crate::permit_workflow_service::PermitWorkflowService;
use crate::scheduled_job_service::{ReminderDelivery, ReminderRepository};

pub(crate) struct FixedClock(pub(crate) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 25, 9, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

/// In-memory implementation of every port with inspection helpers.
pub(crate) struct FakeWorld {
    pub(crate) workspace_id: WorkspaceId,
    permits: Mutex<HashMap<PermitId, Permit>>,
    stale_reads: Mutex<HashMap<PermitId, PermitStatus>>,
    activation_blocked: Mutex<HashSet<PermitId>>,
    approvals: Mutex<Vec<ApprovalEvent>>,
    checklist: Mutex<Vec<ChecklistItem>>,
    tasks: Mutex<Vec<PermitTask>>,
    templates: Mutex<Vec<(WorkspaceId, PermitTemplate)>>,
    qualifications: Mutex<HashMap<String, Vec<QualificationRecord>>>,
    training: Mutex<HashMap<String, Vec<TrainingCompletion>>>,
    audit: Mutex<Vec<AuditEvent>>,
    workspaces: Mutex<Vec<WorkspaceSummary>>,
    members: Mutex<Vec<(WorkspaceId, WorkspaceRole, String)>>,
    sent: Mutex<Vec<EmailMessage>>,
    email_failures: Mutex<u32>,
    notifications: Mutex<Vec<NotificationRecord>>,
    settings: Mutex<HashMap<WorkspaceId, ReminderSettings>>,
    deliveries: Mutex<HashSet<String>>,
}

impl FakeWorld {
    pub(crate) fn new() -> Arc<Self> {
        let workspace_id = WorkspaceId::new();
        let members = WorkspaceRole::all()
            .iter()
            .map(|role| (workspace_id, *role, format!("{role}@example.test")))
            .collect();

        Arc::new(Self {
            workspace_id,
            permits: Mutex::new(HashMap::new()),
            stale_reads: Mutex::new(HashMap::new()),
            activation_blocked: Mutex::new(HashSet::new()),
            approvals: Mutex::new(Vec::new()),
            checklist: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            templates: Mutex::new(Vec::new()),
            qualifications: Mutex::new(HashMap::new()),
            training: Mutex::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
            workspaces: Mutex::new(vec![WorkspaceSummary {
                workspace_id,
                name: "Acme Site".to_owned(),
            }]),
            members: Mutex::new(members),
            sent: Mutex::new(Vec::new()),
            email_failures: Mutex::new(0),
            notifications: Mutex::new(Vec::new()),
            settings: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn actor(&self, role: WorkspaceRole) -> ActorContext {
        ActorContext::new(format!("{role}-1"), self.workspace_id, role)
    }

    pub(crate) fn dispatcher(self: &Arc<Self>) -> NotificationDispatcher {
        NotificationDispatcher::new(self.clone(), self.clone(), self.clone())
            .with_mode(DispatchMode::Inline)
            .with_app_base_url("https://ptw.example.test/")
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            })
    }

    pub(crate) fn workflow(self: &Arc<Self>) -> PermitWorkflowService {
        PermitWorkflowService::new(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.dispatcher(),
        )
        .with_clock(Arc::new(FixedClock(fixed_now())))
    }

    pub(crate) fn credentials(self: &Arc<Self>) -> CredentialService {
        CredentialService::new(self.clone()).with_clock(Arc::new(FixedClock(fixed_now())))
    }

    pub(crate) async fn seed_permit(
        &self,
        status: PermitStatus,
        template: Option<TemplateRef>,
        contractor_id: Option<&str>,
    ) -> Permit {
        let permit = Permit {
            id: PermitId::new(),
            workspace_id: self.workspace_id,
            title: "Hot work on tank 4".to_owned(),
            status,
            metadata: PermitMetadata::new(
                NonEmptyString::new("Tank farm").unwrap_or_else(|_| unreachable!()),
                contractor_id.map(str::to_owned),
            ),
            start_at: None,
            end_at: None,
            template,
            source: PermitSource::Online,
            created_by: "issuer-1".to_owned(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        self.permits.lock().await.insert(permit.id, permit.clone());
        permit
    }

    pub(crate) async fn update_permit(&self, permit: Permit) {
        self.permits.lock().await.insert(permit.id, permit);
    }

    pub(crate) async fn seed_template(
        &self,
        steps: &[WorkspaceRole],
        qualification_gate: Option<QualificationGate>,
    ) -> PermitTemplate {
        self.seed_gated_template(steps, qualification_gate, None)
            .await
    }

    pub(crate) async fn seed_gated_template(
        &self,
        steps: &[WorkspaceRole],
        qualification_gate: Option<QualificationGate>,
        training_gate: Option<TrainingGate>,
    ) -> PermitTemplate {
        let template = PermitTemplate::new(PermitTemplateInput {
            template_id: TemplateId::new(),
            version: 1,
            name: "Hot work".to_owned(),
            approval_steps: steps
                .iter()
                .zip(1..)
                .map(|(role, order)| ApprovalStep {
                    order,
                    role: *role,
                    required: true,
                })
                .collect(),
            qualification_gate,
            training_gate,
        })
        .unwrap_or_else(|_| unreachable!());
        self.templates
            .lock()
            .await
            .push((self.workspace_id, template.clone()));
        template
    }

    pub(crate) async fn seed_qualification(&self, contractor_id: &str, record: QualificationRecord) {
        self.qualifications
            .lock()
            .await
            .entry(contractor_id.to_owned())
            .or_default()
            .push(record);
    }

    pub(crate) async fn seed_training(&self, contractor_id: &str, completion: TrainingCompletion) {
        self.training
            .lock()
            .await
            .entry(contractor_id.to_owned())
            .or_default()
            .push(completion);
    }

    pub(crate) async fn seed_checklist_item(&self, item: ChecklistItem) {
        self.checklist.lock().await.push(item);
    }

    pub(crate) async fn add_member(&self, role: WorkspaceRole, email: &str) {
        self.members
            .lock()
            .await
            .push((self.workspace_id, role, email.to_owned()));
    }

    pub(crate) async fn set_settings(&self, settings: ReminderSettings) {
        self.settings
            .lock()
            .await
            .insert(self.workspace_id, settings);
    }

    /// Makes the next reads of a permit return `status` while storage holds
    /// something else, as if another writer committed in between.
    pub(crate) async fn serve_stale_status(&self, permit_id: PermitId, status: PermitStatus) {
        self.stale_reads.lock().await.insert(permit_id, status);
    }

    pub(crate) async fn fail_next_emails(&self, count: u32) {
        *self.email_failures.lock().await = count;
    }

    pub(crate) async fn stored_permit(&self, permit_id: PermitId) -> Permit {
        self.permits
            .lock()
            .await
            .get(&permit_id)
            .cloned()
            .unwrap_or_else(|| unreachable!())
    }

    pub(crate) async fn audit_actions(&self) -> Vec<AuditAction> {
        self.audit
            .lock()
            .await
            .iter()
            .map(|event| event.action)
            .collect()
    }

    pub(crate) async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit.lock().await.clone()
    }

    pub(crate) async fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub(crate) async fn notification_records(&self) -> Vec<NotificationRecord> {
        self.notifications.lock().await.clone()
    }

    pub(crate) async fn approval_events(&self) -> Vec<ApprovalEvent> {
        self.approvals.lock().await.clone()
    }

    pub(crate) async fn stored_tasks(&self) -> Vec<PermitTask> {
        self.tasks.lock().await.clone()
    }
}

fn ensure_open(permits: &HashMap<PermitId, Permit>, permit_id: PermitId) -> AppResult<()> {
    match permits.get(&permit_id) {
        Some(permit) if permit.status.is_terminal() => Err(AppError::Conflict(format!(
            "permit '{permit_id}' is terminal"
        ))),
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("permit '{permit_id}'"))),
    }
}

#[async_trait]
impl PermitRepository for FakeWorld {
    async fn insert_permit(&self, permit: Permit, audit_event: AuditEvent) -> AppResult<()> {
        self.permits.lock().await.insert(permit.id, permit);
        self.audit.lock().await.push(audit_event);
        Ok(())
    }

    async fn find_permit(
        &self,
        workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Option<Permit>> {
        let mut permit = self
            .permits
            .lock()
            .await
            .get(&permit_id)
            .filter(|permit| permit.workspace_id == workspace_id)
            .cloned();
        if let (Some(permit), Some(stale)) = (
            permit.as_mut(),
            self.stale_reads.lock().await.get(&permit_id),
        ) {
            permit.status = *stale;
        }
        Ok(permit)
    }

    async fn list_approval_events(
        &self,
        _workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ApprovalEvent>> {
        Ok(self
            .approvals
            .lock()
            .await
            .iter()
            .filter(|event| event.permit_id == permit_id)
            .cloned()
            .collect())
    }

    async fn list_checklist_items(
        &self,
        _workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<ChecklistItem>> {
        Ok(self
            .checklist
            .lock()
            .await
            .iter()
            .filter(|item| item.permit_id == permit_id)
            .cloned()
            .collect())
    }

    async fn list_tasks(
        &self,
        _workspace_id: WorkspaceId,
        permit_id: PermitId,
    ) -> AppResult<Vec<PermitTask>> {
        Ok(self
            .tasks
            .lock()
            .await
            .iter()
            .filter(|task| task.permit_id == permit_id)
            .cloned()
            .collect())
    }

    async fn list_permits_due_for_activation(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        let blocked = self.activation_blocked.lock().await;
        let mut due: Vec<Permit> = self
            .permits
            .lock()
            .await
            .values()
            .filter(|permit| {
                permit.workspace_id == workspace_id
                    && permit.status == PermitStatus::Approved
                    && permit.start_at.is_some_and(|start_at| start_at <= now)
                    && !blocked.contains(&permit.id)
            })
            .cloned()
            .collect();
        due.sort_by_key(|permit| (permit.start_at, permit.id.as_uuid()));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_activation_blocked(
        &self,
        _workspace_id: WorkspaceId,
        permit_id: PermitId,
        _blocked_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.activation_blocked.lock().await.insert(permit_id);
        Ok(())
    }

    async fn list_permits_past_end(
        &self,
        workspace_id: WorkspaceId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Permit>> {
        Ok(self
            .permits
            .lock()
            .await
            .values()
            .filter(|permit| {
                permit.workspace_id == workspace_id
                    && matches!(permit.status, PermitStatus::Approved | PermitStatus::Active)
                    && permit.end_at.is_some_and(|end_at| end_at < now)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn commit_status_change(
        &self,
        workspace_id: WorkspaceId,
        commit: StatusChangeCommit,
    ) -> AppResult<Permit> {
        let mut permits = self.permits.lock().await;
        let mut permit = permits
            .get(&commit.permit_id)
            .filter(|permit| permit.workspace_id == workspace_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("permit '{}'", commit.permit_id)))?;
        commit.update.apply(&mut permit, commit.expected_status)?;

        permits.insert(permit.id, permit.clone());
        if let Some(event) = commit.approval_event {
            self.approvals.lock().await.push(event);
        }
        if let Some(task) = commit.task {
            self.tasks.lock().await.push(task);
        }
        self.audit.lock().await.push(commit.audit_event);
        Ok(permit)
    }

    async fn commit_approval(
        &self,
        workspace_id: WorkspaceId,
        commit: ApprovalCommit,
    ) -> AppResult<ApprovalCommitted> {
        let mut permits = self.permits.lock().await;
        let mut permit = permits
            .get(&commit.permit_id)
            .filter(|permit| permit.workspace_id == workspace_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("permit '{}'", commit.permit_id)))?;
        if permit.status != ApprovalCommit::EXPECTED_STATUS {
            return Err(AppError::Conflict("permit is no longer submitted".to_owned()));
        }

        let mut approvals = self.approvals.lock().await;
        let recorded: Vec<ApprovalEvent> = approvals
            .iter()
            .filter(|event| event.permit_id == permit.id)
            .cloned()
            .collect();
        let resolution = commit.resolve(&permit, &recorded);
        if let Some(update) = &resolution.update {
            update.apply(&mut permit, ApprovalCommit::EXPECTED_STATUS)?;
        }

        approvals.push(commit.event);
        permits.insert(permit.id, permit.clone());
        self.audit.lock().await.push(resolution.audit_event);
        Ok(ApprovalCommitted {
            permit,
            progress: resolution.progress,
        })
    }

    async fn save_checklist_item(
        &self,
        _workspace_id: WorkspaceId,
        item: ChecklistItem,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        ensure_open(&*self.permits.lock().await, item.permit_id)?;
        self.activation_blocked.lock().await.remove(&item.permit_id);
        let mut checklist = self.checklist.lock().await;
        match checklist.iter_mut().find(|stored| stored.id == item.id) {
            Some(stored) => *stored = item,
            None => checklist.push(item),
        }
        self.audit.lock().await.push(audit_event);
        Ok(())
    }

    async fn save_task(
        &self,
        _workspace_id: WorkspaceId,
        task: PermitTask,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        ensure_open(&*self.permits.lock().await, task.permit_id)?;
        let mut tasks = self.tasks.lock().await;
        match tasks.iter_mut().find(|stored| stored.id == task.id) {
            Some(stored) => *stored = task,
            None => tasks.push(task),
        }
        self.audit.lock().await.push(audit_event);
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for FakeWorld {
    async fn find_latest_template(
        &self,
        workspace_id: WorkspaceId,
        template_id: TemplateId,
    ) -> AppResult<Option<PermitTemplate>> {
        Ok(self
            .templates
            .lock()
            .await
            .iter()
            .filter(|(stored_workspace_id, template)| {
                *stored_workspace_id == workspace_id
                    && template.reference().template_id == template_id
            })
            .map(|(_, template)| template.clone())
            .max_by_key(|template| template.reference().version))
    }

    async fn find_template_version(
        &self,
        workspace_id: WorkspaceId,
        reference: TemplateRef,
    ) -> AppResult<Option<PermitTemplate>> {
        Ok(self
            .templates
            .lock()
            .await
            .iter()
            .find(|(stored_workspace_id, template)| {
                *stored_workspace_id == workspace_id && template.reference() == reference
            })
            .map(|(_, template)| template.clone()))
    }

    async fn insert_template_version(
        &self,
        workspace_id: WorkspaceId,
        template: PermitTemplate,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut templates = self.templates.lock().await;
        if templates.iter().any(|(stored_workspace_id, stored)| {
            *stored_workspace_id == workspace_id && stored.reference() == template.reference()
        }) {
            return Err(AppError::Conflict("template version exists".to_owned()));
        }
        templates.push((workspace_id, template));
        self.audit.lock().await.push(audit_event);
        Ok(())
    }
}

#[async_trait]
impl CredentialRepository for FakeWorld {
    async fn list_qualifications(
        &self,
        _workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<QualificationRecord>> {
        Ok(self
            .qualifications
            .lock()
            .await
            .get(contractor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_training_completions(
        &self,
        _workspace_id: WorkspaceId,
        contractor_id: &str,
    ) -> AppResult<Vec<TrainingCompletion>> {
        Ok(self
            .training
            .lock()
            .await
            .get(contractor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn count_qualifications_expiring(
        &self,
        _workspace_id: WorkspaceId,
        horizon: NaiveDate,
    ) -> AppResult<u64> {
        Ok(self
            .qualifications
            .lock()
            .await
            .values()
            .flatten()
            .filter(|record| record.expiry_date.is_some_and(|expiry| expiry <= horizon))
            .count() as u64)
    }

    async fn save_qualification(
        &self,
        _workspace_id: WorkspaceId,
        contractor_id: &str,
        record: QualificationRecord,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut qualifications = self.qualifications.lock().await;
        let records = qualifications.entry(contractor_id.to_owned()).or_default();
        records.retain(|stored| stored.qualification_type_id != record.qualification_type_id);
        records.push(record);
        self.audit.lock().await.push(audit_event);
        Ok(())
    }

    async fn save_training_completion(
        &self,
        _workspace_id: WorkspaceId,
        contractor_id: &str,
        completion: TrainingCompletion,
        audit_event: AuditEvent,
    ) -> AppResult<()> {
        let mut training = self.training.lock().await;
        let completions = training.entry(contractor_id.to_owned()).or_default();
        completions.retain(|stored| stored.module_id != completion.module_id);
        completions.push(completion);
        self.audit.lock().await.push(audit_event);
        Ok(())
    }
}

#[async_trait]
impl AuditRepository for FakeWorld {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.audit.lock().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl WorkspaceDirectory for FakeWorld {
    async fn list_workspaces(&self) -> AppResult<Vec<WorkspaceSummary>> {
        Ok(self.workspaces.lock().await.clone())
    }

    async fn find_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> AppResult<Option<WorkspaceSummary>> {
        Ok(self
            .workspaces
            .lock()
            .await
            .iter()
            .find(|workspace| workspace.workspace_id == workspace_id)
            .cloned())
    }

    async fn list_member_emails(
        &self,
        workspace_id: WorkspaceId,
        roles: &[WorkspaceRole],
    ) -> AppResult<Vec<String>> {
        Ok(self
            .members
            .lock()
            .await
            .iter()
            .filter(|(stored_workspace_id, role, _)| {
                *stored_workspace_id == workspace_id && roles.contains(role)
            })
            .map(|(_, _, email)| email.clone())
            .collect())
    }
}

#[async_trait]
impl EmailService for FakeWorld {
    async fn send_email(&self, message: &EmailMessage) -> AppResult<()> {
        let mut failures = self.email_failures.lock().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(AppError::Internal("smtp unavailable".to_owned()));
        }
        drop(failures);

        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

#[async_trait]
impl NotificationLogRepository for FakeWorld {
    async fn record_notification(&self, record: NotificationRecord) -> AppResult<()> {
        self.notifications.lock().await.push(record);
        Ok(())
    }
}

#[async_trait]
impl ReminderRepository for FakeWorld {
    async fn find_settings(&self, workspace_id: WorkspaceId) -> AppResult<Option<ReminderSettings>> {
        Ok(self.settings.lock().await.get(&workspace_id).cloned())
    }

    async fn claim_delivery(
        &self,
        _workspace_id: WorkspaceId,
        delivery: ReminderDelivery,
    ) -> AppResult<bool> {
        Ok(self.deliveries.lock().await.insert(delivery.delivery_key))
    }
}
