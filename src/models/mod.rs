pub mod rbac;
pub mod user;

pub use rbac::{Permission, Role, RolePermission, UserRole, UserWithRoles};
pub use user::User;
