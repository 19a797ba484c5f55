use ptw_core::WorkspaceRole;
use ptw_domain::{ApprovalDecision, Permit, PermitId};

pub(super) struct PermitBrief {
    id: PermitId,
    title: String,
}

impl From<&Permit> for PermitBrief {
    fn from(permit: &Permit) -> Self {
        Self {
            id: permit.id,
            title: permit.title.clone(),
        }
    }
}

pub(super) enum Notice {
    Submitted {
        permit: PermitBrief,
    },
    StepPending {
        permit: PermitBrief,
        role: WorkspaceRole,
    },
    Decision {
        permit: PermitBrief,
        decision: ApprovalDecision,
        comment: String,
    },
    Digest {
        expiring_count: u64,
        windows_days: Vec<u32>,
    },
}

pub(super) struct EmailContent {
    pub(super) subject: String,
    pub(super) html_body: String,
    pub(super) text_body: String,
}

impl Notice {
    pub(super) fn render(&self, workspace_name: &str, app_base_url: &str) -> EmailContent {
        match self {
            Self::Submitted { permit } => {
                let link = permit_link(app_base_url, permit.id);
                EmailContent {
                    subject: format!("Permit submitted for approval: {}", permit.title),
                    html_body: format!(
                        "<h2>Permit submitted for approval</h2>\
                         <p><strong>{}</strong> was submitted in {}.</p>\
                         <p><a href=\"{}\">Open permit</a></p>",
                        escape_html(&permit.title),
                        escape_html(workspace_name),
                        escape_html(&link),
                    ),
                    text_body: format!(
                        "{} was submitted for approval in {workspace_name}.\n\nOpen permit: {link}",
                        permit.title
                    ),
                }
            }
            Self::StepPending { permit, role } => {
                let link = permit_link(app_base_url, permit.id);
                EmailContent {
                    subject: format!("Approval step pending: {}", permit.title),
                    html_body: format!(
                        "<h2>Approval step pending</h2>\
                         <p><strong>{}</strong> in {} is waiting for a {} approval.</p>\
                         <p><a href=\"{}\">Open permit</a></p>",
                        escape_html(&permit.title),
                        escape_html(workspace_name),
                        role.as_str(),
                        escape_html(&link),
                    ),
                    text_body: format!(
                        "{} in {workspace_name} is waiting for a {role} approval.\n\nOpen permit: {link}",
                        permit.title
                    ),
                }
            }
            Self::Decision {
                permit,
                decision,
                comment,
            } => {
                let link = permit_link(app_base_url, permit.id);
                let comment = if comment.trim().is_empty() {
                    "-"
                } else {
                    comment.as_str()
                };
                EmailContent {
                    subject: format!("Permit decision: {decision}"),
                    html_body: format!(
                        "<h2>Permit decision: {decision}</h2>\
                         <p><strong>{}</strong> has a new decision.</p>\
                         <p>Comment: {}</p>\
                         <p><a href=\"{}\">Open permit</a></p>",
                        escape_html(&permit.title),
                        escape_html(comment),
                        escape_html(&link),
                    ),
                    text_body: format!(
                        "{} has a new decision: {decision}.\nComment: {comment}\n\nOpen permit: {link}",
                        permit.title
                    ),
                }
            }
            Self::Digest {
                expiring_count,
                windows_days,
            } => {
                let link = format!("{app_base_url}/app/reminders");
                let windows = windows_days
                    .iter()
                    .map(|days| format!("{days}d"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let intro = format!(
                    "You have {expiring_count} expiring qualification records in the configured reminder window ({windows})."
                );
                EmailContent {
                    subject: "Qualification expiry digest".to_owned(),
                    html_body: format!(
                        "<h2>Qualification expiry digest</h2>\
                         <p>{}</p>\
                         <p>Workspace: {}</p>\
                         <p><a href=\"{}\">Open reminders</a></p>",
                        escape_html(&intro),
                        escape_html(workspace_name),
                        escape_html(&link),
                    ),
                    text_body: format!("{intro}\nWorkspace: {workspace_name}\n\nOpen reminders: {link}"),
                }
            }
        }
    }
}

fn permit_link(app_base_url: &str, permit_id: PermitId) -> String {
    format!("{app_base_url}/app/permits/{permit_id}")
}

pub(super) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
