//! User directory, the identity collaborator the engine reads roles from
use crate::error::ApprovalError;
use crate::types::Role;
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub role: Role,
    #[n(3)]
    pub is_active: bool,
}

impl UserRecord {
    pub fn new(name: &str, role: Role) -> Result<Self, ApprovalError> {
        Ok(Self {
            id: utils::mint_id(utils::USER_HRP)?,
            name: name.to_string(),
            role,
            is_active: true,
        })
    }
}

pub struct Directory {
    tree: sled::Tree,
}

impl Directory {
    pub fn open(db: &sled::Db) -> Result<Self, ApprovalError> {
        Ok(Self {
            tree: db.open_tree("users")?,
        })
    }

    pub fn insert(&self, user: &UserRecord) -> Result<(), ApprovalError> {
        self.tree.insert(user.id.as_bytes(), utils::to_cbor(user)?)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<UserRecord>, ApprovalError> {
        match self.tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Roles are looked up fresh on every engine call, never cached on the
    /// instance: a promotion between steps must be honored. Only the
    /// *expected* role of each step is snapshotted, at instance creation.
    pub fn require(&self, id: &str) -> Result<UserRecord, ApprovalError> {
        self.get(id)?
            .ok_or_else(|| ApprovalError::UserNotFound(id.to_string()))
    }
}
