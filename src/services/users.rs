use crate::{
    auth::{hash_password, verify_password, Role, RoleSet},
    entities::{order, user},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 4, max = 64, message = "Username must be 4-64 characters"))]
    pub username: String,
    #[validate(
        email(message = "Invalid email address"),
        length(max = 120, message = "Email must be at most 120 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub confirm_password: String,
}

impl RegisterInput {
    /// Field rules plus the password confirmation.
    pub fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.password != self.confirm_password {
            return Err(ServiceError::ValidationError("Passwords must match".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAdminUserInput {
    #[validate(length(min = 4, max = 64, message = "Username must be 4-64 characters"))]
    pub username: String,
    #[validate(
        email(message = "Invalid email address"),
        length(max = 120, message = "Email must be at most 120 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRolesInput {
    pub roles: Vec<Role>,
}

/// User as shown to administrators and on the customer dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserProfile {
    fn from(model: user::Model) -> Self {
        Self {
            roles: model.role_set(),
            id: model.id,
            username: model.username,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

/// Registration, credential checks and admin user management.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_unique(&self, username: &str, email: &str) -> Result<(), ServiceError> {
        let db = &*self.db;
        if user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "Username already taken. Please choose a different one.".into(),
            ));
        }
        if user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "Email already registered. Please use a different one.".into(),
            ));
        }
        Ok(())
    }

    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        roles: &RoleSet,
    ) -> Result<user::Model, ServiceError> {
        self.ensure_unique(username, email).await?;

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(password)?),
            roles: Set(roles.to_storage()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            if crate::errors::is_unique_violation(&e) {
                ServiceError::Conflict("Username or email already in use".into())
            } else {
                ServiceError::from(e)
            }
        })?;

        info!(user_id = %created.id, roles = %roles, "user created");
        Ok(created)
    }

    /// Registers a customer account.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, ServiceError> {
        input.check()?;
        let email = normalize_email(&input.email);
        self.insert_user(
            input.username.trim(),
            &email,
            &input.password,
            &RoleSet::single(Role::Customer),
        )
        .await
    }

    /// Customer sign-in by email.
    #[instrument(skip(self, password))]
    pub async fn authenticate_customer(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(&*self.db)
            .await?;

        match found {
            Some(user) if verify_password(password, &user.password_hash)
                && user.role_set().contains(Role::Customer) =>
            {
                Ok(user)
            }
            _ => {
                warn!("customer login failed");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    /// Admin sign-in by username. Requires at least one admin role.
    #[instrument(skip(self, password))]
    pub async fn authenticate_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(username.trim()))
            .one(&*self.db)
            .await?;

        match found {
            Some(user) if verify_password(password, &user.password_hash)
                && user.role_set().has_admin_role() =>
            {
                Ok(user)
            }
            _ => {
                warn!(username, "admin login failed");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Username)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(UserProfile::from)
            .collect())
    }

    pub async fn count_users(&self) -> Result<u64, ServiceError> {
        Ok(user::Entity::find().count(&*self.db).await?)
    }

    /// Creates a back-office account holding the given admin roles.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_admin_user(
        &self,
        input: CreateAdminUserInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let roles = admin_role_set(&input.roles)?;
        let email = normalize_email(&input.email);
        self.insert_user(input.username.trim(), &email, &input.password, &roles)
            .await
    }

    /// Replaces a user's role set.
    #[instrument(skip(self))]
    pub async fn update_roles(&self, id: Uuid, roles: &[Role]) -> Result<user::Model, ServiceError> {
        if roles.is_empty() {
            return Err(ServiceError::ValidationError(
                "Select at least one role".into(),
            ));
        }
        let roles: RoleSet = roles.iter().copied().collect();
        let existing = self.get_user(id).await?;

        let mut model: user::ActiveModel = existing.into();
        model.roles = Set(roles.to_storage());
        let updated = model.update(&*self.db).await?;

        info!(user_id = %id, roles = %roles, "user roles updated");
        Ok(updated)
    }

    /// Deletes a user. Users cannot delete themselves, and users with orders are kept.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid, acting_user: Uuid) -> Result<(), ServiceError> {
        if id == acting_user {
            return Err(ServiceError::Conflict(
                "You cannot delete your own account".into(),
            ));
        }
        self.get_user(id).await?;

        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(id))
            .count(&*self.db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "User has {} orders and cannot be deleted",
                orders
            )));
        }

        user::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Non-empty set made only of admin roles.
fn admin_role_set(roles: &[Role]) -> Result<RoleSet, ServiceError> {
    if roles.is_empty() {
        return Err(ServiceError::ValidationError(
            "Select at least one admin role".into(),
        ));
    }
    if roles.iter().any(|r| !r.is_admin()) {
        return Err(ServiceError::ValidationError(
            "Admin users may only hold admin roles".into(),
        ));
    }
    Ok(roles.iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_rules() {
        let valid = RegisterInput {
            username: "shopper".into(),
            email: "shopper@example.com".into(),
            password: "longenough".into(),
            confirm_password: "longenough".into(),
        };
        assert!(valid.check().is_ok());

        let short_name = RegisterInput {
            username: "abc".into(),
            ..valid.clone()
        };
        assert!(short_name.check().is_err());

        let mismatch = RegisterInput {
            confirm_password: "different1".into(),
            ..valid.clone()
        };
        assert!(matches!(
            mismatch.check(),
            Err(ServiceError::ValidationError(msg)) if msg == "Passwords must match"
        ));

        let bad_email = RegisterInput {
            email: "not-an-email".into(),
            ..valid
        };
        assert!(bad_email.check().is_err());
    }

    #[test]
    fn admin_roles_must_be_admin_and_non_empty() {
        assert!(admin_role_set(&[]).is_err());
        assert!(admin_role_set(&[Role::Customer]).is_err());
        let set = admin_role_set(&[Role::OrderManager, Role::OrderManager]).unwrap();
        assert_eq!(set.to_storage(), "order_manager");
    }
}
