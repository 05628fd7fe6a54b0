use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{db::OrmConn, entity::audit_logs::ActiveModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserSignup,
    UserLogin,
    PasswordResetRequested,
    PasswordReset,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::UserSignup => "user_signup",
            AuditAction::UserLogin => "user_login",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::ProductCreate => "product_create",
            AuditAction::ProductUpdate => "product_update",
            AuditAction::ProductDelete => "product_delete",
        }
    }

    /// Table the action touched.
    pub fn resource(self) -> &'static str {
        match self {
            AuditAction::UserSignup
            | AuditAction::UserLogin
            | AuditAction::PasswordResetRequested
            | AuditAction::PasswordReset => "users",
            AuditAction::ProductCreate | AuditAction::ProductUpdate | AuditAction::ProductDelete => {
                "products"
            }
        }
    }
}

/// Append an audit row. The trail is best effort: a failed write is logged and swallowed.
pub async fn record(orm: &OrmConn, user_id: Option<Uuid>, action: AuditAction, metadata: Value) {
    let row = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.as_str().to_string()),
        resource: Set(Some(action.resource().to_string())),
        metadata: Set(Some(metadata)),
        created_at: NotSet,
    };

    if let Err(err) = row.insert(orm).await {
        tracing::warn!(error = %err, action = action.as_str(), "audit log failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_map_to_their_tables() {
        assert_eq!(AuditAction::UserLogin.as_str(), "user_login");
        assert_eq!(AuditAction::PasswordReset.resource(), "users");
        assert_eq!(AuditAction::ProductDelete.resource(), "products");
    }
}
