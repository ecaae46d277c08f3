//! One execution of a route against one document.
//!
//! The state machine itself lives here as pure transitions on the record;
//! the service layer owns authorization, persistence and the conditioned
//! writes. Splitting it this way keeps the transition rules testable
//! without a database.
use chrono::Utc;

use crate::error::ApprovalError;
use crate::route::{Route, RouteStep};
use crate::types::{InstanceStatus, Role, StepStatus, TimeStamp};
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub document_id: String,
    #[n(2)]
    pub route_id: String,
    /// Content hash of the route template at submit time. Step roles are
    /// copied, not referenced, so later template edits cannot retroactively
    /// alter an in-flight approval; the fingerprint lets an audit detect
    /// that such an edit happened.
    #[n(3)]
    pub route_fingerprint: String,
    #[n(4)]
    pub status: InstanceStatus,
    /// The step_order awaiting action while the instance is pending.
    #[n(5)]
    pub current_step: Option<u32>,
    #[n(6)]
    pub requested_by: String,
    #[n(7)]
    pub requested_at: TimeStamp<Utc>,
    #[n(8)]
    pub rejection_reason: Option<String>,
    #[n(9)]
    pub updated_at: TimeStamp<Utc>,
    /// Snapshot of the chain for this execution, one entry per RouteStep,
    /// created in bulk and replaced wholesale on reset.
    #[n(10)]
    pub steps: Vec<InstanceStep>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InstanceStep {
    #[n(0)]
    pub step_order: u32,
    /// Copied from the route step when the instance is created.
    #[n(1)]
    pub approver_role: Role,
    #[n(2)]
    pub status: StepStatus,
    #[n(3)]
    pub approver: Option<String>,
    #[n(4)]
    pub decided_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub notes: Option<String>,
}

impl InstanceStep {
    fn from_template(step: &RouteStep) -> Self {
        Self {
            step_order: step.step_order,
            approver_role: step.approver_role,
            status: StepStatus::Pending,
            approver: None,
            decided_at: None,
            notes: step.notes.clone(),
        }
    }
}

impl Instance {
    /// Materialize a fresh execution of `route` against a document.
    pub fn start(
        document_id: &str,
        route: &Route,
        requested_by: &str,
    ) -> Result<Self, ApprovalError> {
        let now = TimeStamp::new();
        Ok(Self {
            id: utils::mint_id(utils::INSTANCE_HRP)?,
            document_id: document_id.to_string(),
            route_id: route.id.clone(),
            route_fingerprint: route.fingerprint()?,
            status: InstanceStatus::Pending,
            current_step: route.first_step().map(|s| s.step_order),
            requested_by: requested_by.to_string(),
            requested_at: now.clone(),
            rejection_reason: None,
            updated_at: now,
            steps: route.steps.iter().map(InstanceStep::from_template).collect(),
        })
    }

    /// Reset a terminal instance in place for a re-submission: the record
    /// and its id survive, everything else is rebuilt from the newly
    /// matched route. The previous step set is discarded, not archived.
    pub fn restart(&mut self, route: &Route, requested_by: &str) -> Result<(), ApprovalError> {
        let now = TimeStamp::new();
        self.route_id = route.id.clone();
        self.route_fingerprint = route.fingerprint()?;
        self.status = InstanceStatus::Pending;
        self.current_step = route.first_step().map(|s| s.step_order);
        self.requested_by = requested_by.to_string();
        self.requested_at = now.clone();
        self.rejection_reason = None;
        self.updated_at = now;
        self.steps = route.steps.iter().map(InstanceStep::from_template).collect();
        Ok(())
    }

    /// The step currently awaiting a decision: the pending step at
    /// `current_step`, falling back to the lowest-ordered pending step if
    /// `current_step` is unset. The fallback should not fire under the
    /// exclusivity invariant.
    pub fn current_pending(&self) -> Option<&InstanceStep> {
        match self.current_step {
            Some(order) => self
                .steps
                .iter()
                .find(|s| s.status == StepStatus::Pending && s.step_order == order),
            None => self
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Pending)
                .min_by_key(|s| s.step_order),
        }
    }

    /// Approve the step at `order` and advance. Returns the next approver
    /// role, or None when this was the last step and the instance
    /// completed. A non-pending instance or step refuses the write, the
    /// in-memory analog of an update-where that matched zero rows.
    pub fn record_approval(
        &mut self,
        order: u32,
        approver: &str,
    ) -> Result<Option<Role>, ApprovalError> {
        if self.status != InstanceStatus::Pending {
            return Err(ApprovalError::NoActiveApproval);
        }
        let now = TimeStamp::new();
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.step_order == order && s.status == StepStatus::Pending)
            .ok_or(ApprovalError::ConcurrentModification)?;
        step.status = StepStatus::Approved;
        step.approver = Some(approver.to_string());
        step.decided_at = Some(now.clone());

        let next = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending && s.step_order > order)
            .min_by_key(|s| s.step_order)
            .map(|s| (s.step_order, s.approver_role));

        self.updated_at = now;
        match next {
            Some((next_order, role)) => {
                self.current_step = Some(next_order);
                Ok(Some(role))
            }
            None => {
                self.status = InstanceStatus::Approved;
                self.current_step = None;
                Ok(None)
            }
        }
    }

    /// Reject the step at `order`, terminating the instance. Steps behind
    /// the rejected one are marked skipped: they were never reached and the
    /// trail should say so. Rejection is not resumable.
    pub fn record_rejection(
        &mut self,
        order: u32,
        approver: &str,
        reason: Option<&str>,
    ) -> Result<(), ApprovalError> {
        if self.status != InstanceStatus::Pending {
            return Err(ApprovalError::NoActiveApproval);
        }
        let now = TimeStamp::new();
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.step_order == order && s.status == StepStatus::Pending)
            .ok_or(ApprovalError::ConcurrentModification)?;
        step.status = StepStatus::Rejected;
        step.approver = Some(approver.to_string());
        step.decided_at = Some(now.clone());
        if let Some(reason) = reason {
            step.notes = Some(reason.to_string());
        }

        for step in &mut self.steps {
            if step.status == StepStatus::Pending && step.step_order > order {
                step.status = StepStatus::Skipped;
            }
        }

        self.status = InstanceStatus::Rejected;
        self.current_step = None;
        self.rejection_reason = reason.map(str::to_string);
        self.updated_at = now;
        Ok(())
    }

    /// Tear-down when the owning document is returned to draft. The step
    /// set is cleared wholesale; history is lost by design and a fresh
    /// submit starts a brand-new chain.
    pub fn cancel_for_draft(&mut self) {
        self.steps.clear();
        self.status = InstanceStatus::Cancelled;
        self.current_step = None;
        self.rejection_reason = None;
        self.updated_at = TimeStamp::new();
    }
}
