/*!
 * # Authentication and Authorization
 *
 * Sessions are signed tokens issued at login. Each request that needs an
 * identity extracts it explicitly through [`CustomerSession`] or
 * [`AdminSession`]; permission checks go through [`Identity::require`] or the
 * router-level [`AuthRouterExt::with_permission`] gate.
 */

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod password;
pub mod permissions;
pub mod rbac;
pub mod session;

pub use password::{hash_password, verify_password};
pub use permissions::Permission;
pub use rbac::{Role, RoleSet, ROLE_PERMISSIONS};
pub use session::{Claims, IssuedSession, SessionService};

use crate::errors::ServiceError;

/// Which side of the application a session belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Realm {
    Customer,
    Admin,
}

impl Realm {
    pub fn login_path(&self) -> &'static str {
        match self {
            Realm::Customer => "/login",
            Realm::Admin => "/admin/login",
        }
    }

    pub fn cookie_name(&self) -> &'static str {
        match self {
            Realm::Customer => "moune_session",
            Realm::Admin => "moune_admin_session",
        }
    }
}

/// The authenticated principal of a request.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub roles: RoleSet,
    pub realm: Realm,
    #[serde(skip)]
    pub session_id: String,
    #[serde(skip)]
    pub expires_at: i64,
}

impl Identity {
    /// `super_admin` passes every check.
    pub fn can(&self, permission: Permission) -> bool {
        self.roles.is_super_admin() || self.roles.permissions().contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.user_id,
                permission = %permission,
                "permission denied"
            );
            Err(ServiceError::PermissionDenied { permission })
        }
    }

    /// Effective permissions, with the super_admin bypass applied.
    pub fn permissions(&self) -> Vec<Permission> {
        if self.roles.is_super_admin() {
            Permission::all()
        } else {
            self.roles.permissions().into_iter().collect()
        }
    }
}

/// Reads the session token: `Authorization: Bearer` first, then the realm's cookie.
pub fn session_token(parts: &Parts, realm: Realm) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == realm.cookie_name() && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

async fn authenticate(
    parts: &mut Parts,
    sessions: &SessionService,
    realm: Realm,
) -> Result<Identity, ServiceError> {
    if let Some(identity) = parts.extensions.get::<Identity>() {
        if identity.realm == realm {
            return Ok(identity.clone());
        }
    }

    let token = session_token(parts, realm).ok_or(ServiceError::SessionRequired { realm })?;
    let identity = sessions.validate(&token, realm).await?;

    if realm == Realm::Admin && !identity.roles.has_admin_role() {
        return Err(ServiceError::SessionRequired { realm });
    }

    parts.extensions.insert(identity.clone());
    Ok(identity)
}

/// Extractor for routes that need a signed-in customer.
#[derive(Debug, Clone)]
pub struct CustomerSession(pub Identity);

/// Extractor for routes that need a signed-in administrator.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CustomerSession
where
    S: Send + Sync,
    Arc<SessionService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionService>::from_ref(state);
        authenticate(parts, &sessions, Realm::Customer)
            .await
            .map(CustomerSession)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    Arc<SessionService>: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionService>::from_ref(state);
        authenticate(parts, &sessions, Realm::Admin)
            .await
            .map(AdminSession)
    }
}

/// State for the router-level permission gate.
#[derive(Clone)]
pub struct PermissionGate {
    sessions: Arc<SessionService>,
    permission: Permission,
}

impl FromRef<PermissionGate> for Arc<SessionService> {
    fn from_ref(gate: &PermissionGate) -> Self {
        gate.sessions.clone()
    }
}

/// Rejects the request unless the admin session holds the gate's permission.
pub async fn permission_middleware(
    State(gate): State<PermissionGate>,
    AdminSession(identity): AdminSession,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    identity.require(gate.permission)?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_permission(self, sessions: Arc<SessionService>, permission: Permission) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_permission(self, sessions: Arc<SessionService>, permission: Permission) -> Self {
        self.route_layer(axum::middleware::from_fn_with_state(
            PermissionGate {
                sessions,
                permission,
            },
            permission_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn identity(roles: &str) -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            username: "tester".into(),
            roles: RoleSet::parse(roles),
            realm: Realm::Admin,
            session_id: "jti".into(),
            expires_at: 0,
        }
    }

    #[test]
    fn inventory_manager_cannot_manage_products() {
        let id = identity("inventory_manager");
        assert!(id.can(Permission::ManageInventory));
        assert!(!id.can(Permission::ManageProducts));
        assert!(id.require(Permission::ManageProducts).is_err());
    }

    #[test]
    fn super_admin_bypasses_every_check() {
        let id = identity("super_admin");
        for permission in Permission::all() {
            assert!(id.can(permission));
        }
        assert_eq!(id.permissions().len(), Permission::all().len());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let (parts, _) = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer from-header")
            .header(header::COOKIE, "moune_session=from-cookie")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(
            session_token(&parts, Realm::Customer).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn cookie_is_read_per_realm() {
        let (parts, _) = HttpRequest::builder()
            .header(
                header::COOKIE,
                "theme=dark; moune_admin_session=admin-token; moune_session=cust-token",
            )
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(
            session_token(&parts, Realm::Admin).as_deref(),
            Some("admin-token")
        );
        assert_eq!(
            session_token(&parts, Realm::Customer).as_deref(),
            Some("cust-token")
        );
    }

    #[test]
    fn no_token_present() {
        let (parts, _) = HttpRequest::builder().body(()).unwrap().into_parts();
        assert!(session_token(&parts, Realm::Admin).is_none());
    }
}
