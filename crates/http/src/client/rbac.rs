//! Role and permission administration endpoints

use super::{AuthenticatedClient, ClientError};
use crate::types::{Permission, Role, RoleAssignmentRequest, RoleRequest};
use reqwest::Method;

impl AuthenticatedClient {
    /// List all roles
    pub async fn list_roles(&self) -> Result<Vec<Role>, ClientError> {
        let req = self.request(Method::GET, "/roles");
        self.execute(req).await
    }

    /// Create a role
    pub async fn create_role(&self, request: &RoleRequest) -> Result<Role, ClientError> {
        let req = self.request(Method::POST, "/roles").json(request);
        self.execute(req).await
    }

    /// Update name, description or permissions of a role
    pub async fn update_role(
        &self,
        role_id: &str,
        request: &RoleRequest,
    ) -> Result<Role, ClientError> {
        let req = self
            .request(Method::PATCH, &format!("/roles/{role_id}"))
            .json(request);
        self.execute(req).await
    }

    /// Delete a role
    pub async fn delete_role(&self, role_id: &str) -> Result<(), ClientError> {
        let req = self.request(Method::DELETE, &format!("/roles/{role_id}"));
        self.execute_empty(req).await
    }

    /// List all permissions
    pub async fn list_permissions(&self) -> Result<Vec<Permission>, ClientError> {
        let req = self.request(Method::GET, "/permissions");
        self.execute(req).await
    }

    /// Assign a role to a user
    pub async fn assign_role(&self, user_id: &str, role_id: &str) -> Result<(), ClientError> {
        let req = self
            .request(Method::POST, &format!("/rbac/users/{user_id}/roles"))
            .json(&RoleAssignmentRequest {
                role_id: role_id.to_string(),
            });
        self.execute_empty(req).await
    }

    /// Remove a role from a user
    pub async fn revoke_role(&self, user_id: &str, role_id: &str) -> Result<(), ClientError> {
        let req = self.request(
            Method::DELETE,
            &format!("/rbac/users/{user_id}/roles/{role_id}"),
        );
        self.execute_empty(req).await
    }
}
