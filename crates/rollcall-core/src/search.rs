//! Name search over the user list

use crate::models::User;

/// Users whose name contains `query`, ignoring case, in list order
///
/// An empty query returns every user. Nothing is cached; the list is
/// scanned on every call.
pub fn project<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let needle = query.to_lowercase();
    users
        .iter()
        .filter(|u| needle.is_empty() || u.name.to_lowercase().contains(&needle))
        .collect()
}
