//! Documents as the engine sees them, and their sled-backed store.
//!
//! The engine reads amount, requester and approval status, and writes the
//! approval outcome fields. Every other aspect of a quote or purchase
//! order belongs to the external CRUD layer.
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};

use crate::error::ApprovalError;
use crate::types::{ApprovalStatus, DocumentKind, TimeStamp};
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Document {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: DocumentKind,
    /// Integer currency (yen), matching how the rest of the system stores
    /// monetary amounts.
    #[n(2)]
    pub amount: u64,
    #[n(3)]
    pub requester: String,
    #[n(4)]
    pub approval_status: ApprovalStatus,
    #[n(5)]
    pub approved_by: Option<String>,
    #[n(6)]
    pub approved_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub rejected_by: Option<String>,
    #[n(8)]
    pub rejected_at: Option<TimeStamp<Utc>>,
}

impl Document {
    /// A fresh draft owned by `requester`.
    pub fn draft(
        kind: DocumentKind,
        amount: u64,
        requester: &str,
    ) -> Result<Self, ApprovalError> {
        Ok(Self {
            id: utils::mint_id(utils::DOCUMENT_HRP)?,
            kind,
            amount,
            requester: requester.to_string(),
            approval_status: ApprovalStatus::Draft,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
        })
    }
}

pub struct DocumentStore {
    pub(crate) tree: sled::Tree,
}

impl DocumentStore {
    pub fn open(db: &sled::Db) -> Result<Self, ApprovalError> {
        Ok(Self {
            tree: db.open_tree("documents")?,
        })
    }

    /// Seeding path for callers that own document CRUD.
    pub fn insert(&self, document: &Document) -> Result<(), ApprovalError> {
        self.tree
            .insert(document.id.as_bytes(), utils::to_cbor(document)?)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Document>, ApprovalError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn require(&self, id: &str) -> Result<Document, ApprovalError> {
        self.get(id)?
            .ok_or_else(|| ApprovalError::DocumentNotFound(id.to_string()))
    }
}

/// The write-back contract: flip the document's approval status only if
/// its current status matches `expected`. A mismatch means somebody else
/// changed the document between our read and this write, and the caller
/// must hear about it rather than have the change silently overwritten.
pub(crate) fn cas_status(
    tree: &TransactionalTree,
    id: &str,
    expected: ApprovalStatus,
    mutate: impl FnOnce(&mut Document),
) -> Result<Document, ConflictableTransactionError<ApprovalError>> {
    let bytes = tree.get(id.as_bytes())?.ok_or_else(|| {
        ConflictableTransactionError::Abort(ApprovalError::DocumentNotFound(id.to_string()))
    })?;
    let mut document: Document = minicbor::decode(&bytes)
        .map_err(|e| ConflictableTransactionError::Abort(ApprovalError::Decode(e)))?;
    if document.approval_status != expected {
        return Err(ConflictableTransactionError::Abort(
            ApprovalError::ConcurrentModification,
        ));
    }
    mutate(&mut document);
    let encoded = utils::to_cbor(&document).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(id.as_bytes(), encoded)?;
    Ok(document)
}
