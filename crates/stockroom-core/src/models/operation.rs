//! Pending operation model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ProductDraft, ProductId};
use crate::error::Error;

/// Kind of mutation carried by a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationAction {
    Create,
    Update,
    Delete,
}

impl OperationAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("unknown operation '{other}'"))),
        }
    }
}

/// A mutation to replay against the remote catalog
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Create the product currently stored under a temporary identifier
    Create {
        temp_id: ProductId,
        payload: ProductDraft,
    },
    /// Replace the fields of an existing product
    Update { id: ProductId, payload: ProductDraft },
    /// Remove a product
    Delete { id: ProductId },
}

impl OperationKind {
    pub const fn action(&self) -> OperationAction {
        match self {
            Self::Create { .. } => OperationAction::Create,
            Self::Update { .. } => OperationAction::Update,
            Self::Delete { .. } => OperationAction::Delete,
        }
    }

    /// Identifier the operation targeted at enqueue time (may be temporary)
    pub const fn target_id(&self) -> &ProductId {
        match self {
            Self::Create { temp_id, .. } => temp_id,
            Self::Update { id, .. } | Self::Delete { id } => id,
        }
    }

    pub const fn payload(&self) -> Option<&ProductDraft> {
        match self {
            Self::Create { payload, .. } | Self::Update { payload, .. } => Some(payload),
            Self::Delete { .. } => None,
        }
    }

    /// Rebuild an operation from its stored columns
    pub fn from_parts(
        action: OperationAction,
        target_id: ProductId,
        payload: Option<ProductDraft>,
    ) -> Result<Self, Error> {
        match (action, payload) {
            (OperationAction::Create, Some(payload)) => {
                if !target_id.is_temporary() {
                    return Err(Error::InvalidInput(format!(
                        "create operation must target a temporary id, got {target_id}"
                    )));
                }
                Ok(Self::Create {
                    temp_id: target_id,
                    payload,
                })
            }
            (OperationAction::Update, Some(payload)) => Ok(Self::Update {
                id: target_id,
                payload,
            }),
            (OperationAction::Delete, _) => Ok(Self::Delete { id: target_id }),
            (action, None) => Err(Error::InvalidInput(format!(
                "{action} operation for {target_id} has no payload"
            ))),
        }
    }
}

/// An entry of the pending operation log
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Insertion sequence; the log's only ordering signal
    pub seq: i64,
    pub kind: OperationKind,
    /// Enqueue time (Unix ms), informational
    pub enqueued_at: i64,
}

impl Operation {
    pub const fn target_id(&self) -> &ProductId {
        self.kind.target_id()
    }

    pub const fn action(&self) -> OperationAction {
        self.kind.action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_requires_payload_for_writes() {
        let id = ProductId::new("abc123");
        assert!(OperationKind::from_parts(OperationAction::Update, id.clone(), None).is_err());
        let delete = OperationKind::from_parts(OperationAction::Delete, id.clone(), None).unwrap();
        assert_eq!(delete, OperationKind::Delete { id });
    }

    #[test]
    fn create_must_target_temporary_id() {
        let payload = ProductDraft::new("Widget");
        assert!(OperationKind::from_parts(
            OperationAction::Create,
            ProductId::new("abc123"),
            Some(payload.clone())
        )
        .is_err());

        let temp_id = ProductId::temporary();
        let create =
            OperationKind::from_parts(OperationAction::Create, temp_id.clone(), Some(payload))
                .unwrap();
        assert_eq!(create.target_id(), &temp_id);
        assert_eq!(create.action(), OperationAction::Create);
    }

    #[test]
    fn action_parses_stored_names() {
        for action in [
            OperationAction::Create,
            OperationAction::Update,
            OperationAction::Delete,
        ] {
            assert_eq!(action.as_str().parse::<OperationAction>().unwrap(), action);
        }
    }
}
