//! 身份提取
//!
//! 身份验证由上游网关完成，这里只信任网关注入的
//! `x-user-id` / `x-user-role` 头。缺头视为未认证。

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::utils::AppError;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "student" => Some(Role::Student),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// 员工操作权限 (staff 与 admin)
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

/// 当前用户 - 从网关注入的头部提取
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

impl CurrentUser {
    /// 员工权限检查，handler 里按需调用
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::forbidden("Staff role required"))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let id = parts
            .headers
            .get("x-user-id")
            .and_then(|h| h.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|h| h.to_str().ok())
            .and_then(Role::parse)
            .ok_or(AppError::Unauthorized)?;

        let user = CurrentUser { id, role };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("staff"), Some(Role::Staff));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("chef"), None);
    }

    #[test]
    fn staff_check() {
        assert!(Role::Staff.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Student.is_staff());
    }
}
