/// Access policy for tasks and users
///
/// Every authorization decision in the system goes through
/// [`AccessPolicy`]. It is a pure function of the principal, the operation,
/// and the ownership facts of the target record; it performs no I/O and
/// never fails on input shape.
///
/// # Rules
///
/// | Operation | Allowed for |
/// |---|---|
/// | task list / create / update / delete | admin |
/// | task read / download document / change status | admin, creator, assignee |
/// | user read / update | admin, the user themself |
/// | user list / create / delete / change role | admin |
///
/// An ownership-gated operation evaluated without ownership facts denies
/// every non-admin.
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::authorization::{AccessPolicy, Decision, Operation, Ownership};
/// use taskboard_shared::auth::middleware::Principal;
/// use taskboard_shared::models::user::Role;
/// use uuid::Uuid;
///
/// let assignee = Principal::new(Uuid::new_v4(), Role::User);
/// let ownership = Ownership { creator_id: Uuid::new_v4(), assignee_id: assignee.id };
///
/// assert_eq!(
///     AccessPolicy::evaluate(&assignee, Operation::Read, Some(&ownership)),
///     Decision::Allow
/// );
/// assert!(!AccessPolicy::evaluate(&assignee, Operation::Delete, Some(&ownership)).is_allowed());
/// ```

use uuid::Uuid;

use super::middleware::Principal;

const ADMIN_ONLY: &str = "Not authorized as an admin";
const UPDATE_ADMIN_ONLY: &str =
    "Not authorized to update this task. Only administrators can edit tasks.";
const TASK_ACCESS: &str = "Not authorized to access this task";
const STATUS_ACCESS: &str = "Not authorized to update this task status";
const USER_ACCESS: &str = "Not authorized to access this resource";
const ROLE_CHANGE: &str = "Not authorized to change role";

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("{0}")]
    Forbidden(String),
}

/// Task operations subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
    DownloadDocument,
    ChangeStatus,
}

/// User-resource operations subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOperation {
    List,
    Create,
    Read,
    Update,
    Delete,
    ChangeRole,
}

/// Ownership facts of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub creator_id: Uuid,
    pub assignee_id: Uuid,
}

impl Ownership {
    fn involves(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.assignee_id == user_id
    }
}

/// Outcome of a policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Converts a denial into `AuthzError::Forbidden`
    pub fn into_result(self) -> Result<(), AuthzError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AuthzError::Forbidden(reason.to_string())),
        }
    }
}

/// Side-effect-free access evaluator
pub struct AccessPolicy;

impl AccessPolicy {
    /// Evaluates a task operation
    pub fn evaluate(
        principal: &Principal,
        operation: Operation,
        ownership: Option<&Ownership>,
    ) -> Decision {
        if principal.is_admin() {
            return Decision::Allow;
        }

        let involved = ownership.is_some_and(|o| o.involves(principal.id));

        match operation {
            Operation::List | Operation::Create | Operation::Delete => Decision::Deny(ADMIN_ONLY),
            Operation::Update => Decision::Deny(UPDATE_ADMIN_ONLY),
            Operation::Read | Operation::DownloadDocument if involved => Decision::Allow,
            Operation::Read | Operation::DownloadDocument => Decision::Deny(TASK_ACCESS),
            Operation::ChangeStatus if involved => Decision::Allow,
            Operation::ChangeStatus => Decision::Deny(STATUS_ACCESS),
        }
    }

    /// Evaluates a user-resource operation against `target`
    pub fn evaluate_user(
        principal: &Principal,
        operation: UserOperation,
        target: Option<Uuid>,
    ) -> Decision {
        if principal.is_admin() {
            return Decision::Allow;
        }

        match operation {
            UserOperation::Read | UserOperation::Update if target == Some(principal.id) => {
                Decision::Allow
            }
            UserOperation::Read | UserOperation::Update => Decision::Deny(USER_ACCESS),
            UserOperation::ChangeRole => Decision::Deny(ROLE_CHANGE),
            UserOperation::List | UserOperation::Create | UserOperation::Delete => {
                Decision::Deny(ADMIN_ONLY)
            }
        }
    }

    /// Evaluates a task operation and converts a denial into an error
    pub fn authorize(
        principal: &Principal,
        operation: Operation,
        ownership: Option<&Ownership>,
    ) -> Result<(), AuthzError> {
        Self::evaluate(principal, operation, ownership).into_result()
    }

    /// Evaluates a user operation and converts a denial into an error
    pub fn authorize_user(
        principal: &Principal,
        operation: UserOperation,
        target: Option<Uuid>,
    ) -> Result<(), AuthzError> {
        Self::evaluate_user(principal, operation, target).into_result()
    }
}
