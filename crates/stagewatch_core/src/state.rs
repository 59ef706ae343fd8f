use crate::{ResetPolicy, RetryBudget, RetryPolicy, StatusMessage, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Reconnecting,
    /// Terminal; nothing reopens a closed subscription.
    Closed,
}

/// Everything one subscription knows about its stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    task_id: TaskId,
    policy: RetryPolicy,
    connection: ConnectionState,
    budget: RetryBudget,
    latest: Option<StatusMessage>,
    last_error: Option<String>,
}

impl SubscriptionState {
    pub fn new(task_id: TaskId, policy: RetryPolicy) -> Self {
        Self {
            task_id,
            budget: policy.budget(),
            policy,
            connection: ConnectionState::Idle,
            latest: None,
            last_error: None,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn latest(&self) -> Option<&StatusMessage> {
        self.latest.as_ref()
    }

    /// Consumer-visible transport error; cleared when a connection opens.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.connection == ConnectionState::Closed
    }

    pub(crate) fn set_connection(&mut self, next: ConnectionState) -> bool {
        if self.connection == next {
            return false;
        }
        self.connection = next;
        true
    }

    pub(crate) fn mark_opened(&mut self) {
        self.last_error = None;
        if self.policy.reset == ResetPolicy::OnOpen {
            self.budget = self.policy.budget();
        }
    }

    pub(crate) fn record_failure(&mut self, reason: String) {
        self.last_error = Some(reason);
    }

    pub(crate) fn schedule_retry(&mut self) -> Option<(std::time::Duration, u32)> {
        let delay = self.policy.schedule(&mut self.budget)?;
        Some((delay, self.budget.attempt))
    }

    pub(crate) fn set_latest(&mut self, msg: StatusMessage) {
        self.latest = Some(msg);
    }
}
