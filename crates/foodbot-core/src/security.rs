use crate::domain::UserId;

// ============== Authorization ==============

/// Admin-only commands (`clear`, `restart`, `list_keys`) check the caller against the
/// configured admin list. An empty list means nobody is an admin.
pub fn is_admin(user_id: Option<UserId>, admin_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if admin_users.is_empty() {
        return false;
    }
    admin_users.contains(&user_id.0)
}
