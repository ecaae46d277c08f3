//! Service layer API for approval workflow operations.
//!
//! Each public operation is a short, synchronous sequence: read, validate,
//! compute the transition, then commit it in a single transaction over the
//! instance and document trees. Every write inside the transaction is
//! conditioned on the bytes the operation first observed, so a lost race
//! surfaces as `ConcurrentModification` instead of clobbering a concurrent
//! decision.
use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::directory::Directory;
use crate::document::{self, DocumentStore};
use crate::error::ApprovalError;
use crate::instance::Instance;
use crate::notify::Notifier;
use crate::route::RouteCatalog;
use crate::types::{ApprovalStatus, InstanceStatus, Role, TimeStamp};
use crate::utils;

/// Outcome of a single approval decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub instance_id: String,
    /// Role expected at the next step; None when the instance reached a
    /// terminal state.
    pub next_approver_role: Option<Role>,
}

pub struct ApprovalService {
    instances: sled::Tree,
    documents: DocumentStore,
    users: Directory,
    routes: RouteCatalog,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApprovalService {
    pub fn new(db: Arc<sled::Db>) -> Result<Self, ApprovalError> {
        Ok(Self {
            instances: db.open_tree("approval_instances")?,
            documents: DocumentStore::open(&db)?,
            users: Directory::open(&db)?,
            routes: RouteCatalog::open(&db)?,
            notifier: None,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn routes(&self) -> &RouteCatalog {
        &self.routes
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn users(&self) -> &Directory {
        &self.users
    }

    /// The instance currently bound to a document, if any.
    pub fn instance(&self, document_id: &str) -> Result<Option<Instance>, ApprovalError> {
        match self.instances.get(document_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Submit a draft document for approval.
    ///
    /// Matches a route for the requester's role and the document amount,
    /// materializes the instance with its step snapshot, and flips the
    /// document to pending. A document whose last run ended in a terminal
    /// state reuses its instance record, reset in place.
    pub fn submit(&self, document_id: &str, requester_id: &str) -> Result<Instance, ApprovalError> {
        let doc = self.documents.require(document_id)?;
        if doc.approval_status != ApprovalStatus::Draft {
            return Err(ApprovalError::InvalidState {
                expected: ApprovalStatus::Draft,
                found: doc.approval_status,
            });
        }

        let requester = self.users.require(requester_id)?;
        if !requester.is_active {
            return Err(ApprovalError::Forbidden);
        }
        if doc.requester != requester_id && !requester.role.is_back_office() {
            return Err(ApprovalError::Forbidden);
        }

        let route = self.routes.match_route(requester.role, doc.amount)?;
        if route.steps.is_empty() {
            return Err(ApprovalError::MisconfiguredRoute(route.id.clone()));
        }

        // Expected-prior snapshot for the conditioned writes below.
        let prior = self.instances.get(document_id.as_bytes())?;
        let instance = match prior.as_ref() {
            Some(bytes) => {
                let mut existing: Instance = minicbor::decode(bytes)?;
                if existing.status == InstanceStatus::Pending {
                    return Err(ApprovalError::AlreadyInProgress);
                }
                existing.restart(&route, requester_id)?;
                existing
            }
            None => Instance::start(document_id, &route, requester_id)?,
        };
        let encoded = utils::to_cbor(&instance)?;

        let result = (&self.instances, &self.documents.tree).transaction(|(itree, dtree)| {
            if itree.get(document_id.as_bytes())? != prior {
                return Err(ConflictableTransactionError::Abort(
                    ApprovalError::ConcurrentModification,
                ));
            }
            itree.insert(document_id.as_bytes(), encoded.clone())?;
            document::cas_status(dtree, document_id, ApprovalStatus::Draft, |doc| {
                doc.approval_status = ApprovalStatus::Pending;
            })?;
            Ok(())
        });
        unwrap_txn(result)?;

        tracing::info!(
            document_id,
            instance_id = %instance.id,
            route_id = %instance.route_id,
            "submitted for approval"
        );
        Ok(instance)
    }

    /// Approve the current pending step of a document's approval. On the
    /// last step this completes the instance and flips the document to
    /// approved.
    pub fn approve(&self, document_id: &str, approver_id: &str) -> Result<Decision, ApprovalError> {
        let prior = self
            .instances
            .get(document_id.as_bytes())?
            .ok_or(ApprovalError::NoActiveApproval)?;
        let mut instance: Instance = minicbor::decode(&prior)?;
        if instance.status != InstanceStatus::Pending {
            return Err(ApprovalError::NoActiveApproval);
        }
        let step = instance
            .current_pending()
            .ok_or(ApprovalError::NoActiveApproval)?;
        let step_order = step.step_order;
        let expected = step.approver_role;

        let approver = self.users.require(approver_id)?;
        if !approver.is_active {
            return Err(ApprovalError::Forbidden);
        }
        if approver.role != expected {
            return Err(ApprovalError::WrongApproverRole { expected });
        }

        let next_role = instance.record_approval(step_order, approver_id)?;
        let completed = instance.status == InstanceStatus::Approved;
        let encoded = utils::to_cbor(&instance)?;

        let result = (&self.instances, &self.documents.tree).transaction(|(itree, dtree)| {
            let current = itree.get(document_id.as_bytes())?;
            if current.as_deref() != Some(prior.as_ref()) {
                return Err(ConflictableTransactionError::Abort(
                    ApprovalError::ConcurrentModification,
                ));
            }
            itree.insert(document_id.as_bytes(), encoded.clone())?;
            if completed {
                document::cas_status(dtree, document_id, ApprovalStatus::Pending, |doc| {
                    doc.approval_status = ApprovalStatus::Approved;
                    doc.approved_by = Some(approver_id.to_string());
                    doc.approved_at = Some(TimeStamp::new());
                })?;
            }
            Ok(())
        });
        unwrap_txn(result)?;

        tracing::info!(
            document_id,
            instance_id = %instance.id,
            step = step_order,
            completed,
            "step approved"
        );
        Ok(Decision {
            instance_id: instance.id,
            next_approver_role: next_role,
        })
    }

    /// Reject the current pending step, terminating the approval. The
    /// document must be explicitly returned to draft to re-enter the flow.
    pub fn reject(
        &self,
        document_id: &str,
        approver_id: &str,
        reason: Option<&str>,
    ) -> Result<Decision, ApprovalError> {
        let prior = self
            .instances
            .get(document_id.as_bytes())?
            .ok_or(ApprovalError::NoActiveApproval)?;
        let mut instance: Instance = minicbor::decode(&prior)?;
        if instance.status != InstanceStatus::Pending {
            return Err(ApprovalError::NoActiveApproval);
        }
        let step = instance
            .current_pending()
            .ok_or(ApprovalError::NoActiveApproval)?;
        let step_order = step.step_order;
        let expected = step.approver_role;

        let approver = self.users.require(approver_id)?;
        if !approver.is_active {
            return Err(ApprovalError::Forbidden);
        }
        if approver.role != expected {
            return Err(ApprovalError::WrongApproverRole { expected });
        }

        instance.record_rejection(step_order, approver_id, reason)?;
        let encoded = utils::to_cbor(&instance)?;

        let result = (&self.instances, &self.documents.tree).transaction(|(itree, dtree)| {
            let current = itree.get(document_id.as_bytes())?;
            if current.as_deref() != Some(prior.as_ref()) {
                return Err(ConflictableTransactionError::Abort(
                    ApprovalError::ConcurrentModification,
                ));
            }
            itree.insert(document_id.as_bytes(), encoded.clone())?;
            document::cas_status(dtree, document_id, ApprovalStatus::Pending, |doc| {
                doc.approval_status = ApprovalStatus::Rejected;
                doc.rejected_by = Some(approver_id.to_string());
                doc.rejected_at = Some(TimeStamp::new());
            })?;
            Ok(())
        });
        unwrap_txn(result)?;

        tracing::info!(
            document_id,
            instance_id = %instance.id,
            step = step_order,
            "step rejected"
        );
        // Best-effort, dispatched only once the transition is committed.
        self.dispatch_rejection_notice(document_id, &approver.name, reason);

        Ok(Decision {
            instance_id: instance.id,
            next_approver_role: None,
        })
    }

    /// Return a rejected document to draft, the only undo path. The
    /// instance is cancelled and its step history discarded; a new submit
    /// starts a brand-new chain.
    pub fn return_to_draft(&self, document_id: &str) -> Result<(), ApprovalError> {
        let doc = self.documents.require(document_id)?;
        if doc.approval_status != ApprovalStatus::Rejected {
            return Err(ApprovalError::InvalidState {
                expected: ApprovalStatus::Rejected,
                found: doc.approval_status,
            });
        }

        let prior = self
            .instances
            .get(document_id.as_bytes())?
            .ok_or(ApprovalError::NoActiveApproval)?;
        let mut instance: Instance = minicbor::decode(&prior)?;
        instance.cancel_for_draft();
        let encoded = utils::to_cbor(&instance)?;

        let result = (&self.instances, &self.documents.tree).transaction(|(itree, dtree)| {
            let current = itree.get(document_id.as_bytes())?;
            if current.as_deref() != Some(prior.as_ref()) {
                return Err(ConflictableTransactionError::Abort(
                    ApprovalError::ConcurrentModification,
                ));
            }
            itree.insert(document_id.as_bytes(), encoded.clone())?;
            document::cas_status(dtree, document_id, ApprovalStatus::Rejected, |doc| {
                doc.approval_status = ApprovalStatus::Draft;
                doc.approved_by = None;
                doc.approved_at = None;
                doc.rejected_by = None;
                doc.rejected_at = None;
            })?;
            Ok(())
        });
        unwrap_txn(result)?;

        tracing::info!(document_id, instance_id = %instance.id, "returned to draft");
        Ok(())
    }

    fn dispatch_rejection_notice(
        &self,
        document_id: &str,
        rejected_by_name: &str,
        reason: Option<&str>,
    ) {
        let Some(notifier) = self.notifier.as_ref().map(Arc::clone) else {
            return;
        };
        let document_id = document_id.to_string();
        let rejected_by = rejected_by_name.to_string();
        let reason = reason.map(str::to_string);
        std::thread::spawn(move || {
            if let Err(err) = notifier.notify_rejected(&document_id, &rejected_by, reason.as_deref())
            {
                tracing::warn!(%document_id, %err, "rejection notification failed");
            }
        });
    }
}

fn unwrap_txn<T>(result: Result<T, TransactionError<ApprovalError>>) -> Result<T, ApprovalError> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => Err(ApprovalError::Storage(err)),
    }
}
