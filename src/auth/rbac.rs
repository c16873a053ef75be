/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Roles, the typed role set stored on each user, and the static table that
 * maps roles to permissions.
 */

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::warn;

use super::Permission;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    ProductManager,
    OrderManager,
    InventoryManager,
    CategoryManager,
    UserManager,
    Customer,
}

impl Role {
    /// Every role that may sign in to the admin realm.
    pub fn admin_roles() -> Vec<Role> {
        Role::iter().filter(|r| r.is_admin()).collect()
    }

    pub fn is_admin(&self) -> bool {
        !matches!(self, Role::Customer)
    }
}

lazy_static! {
    /// Static role → permission table. `super_admin` is listed with every
    /// permission, and `Identity::can` additionally lets it bypass checks.
    pub static ref ROLE_PERMISSIONS: HashMap<Role, HashSet<Permission>> = {
        let mut table = HashMap::new();
        table.insert(Role::SuperAdmin, Permission::all().into_iter().collect());
        table.insert(Role::ProductManager, HashSet::from([Permission::ManageProducts]));
        table.insert(Role::OrderManager, HashSet::from([Permission::ManageOrders]));
        table.insert(Role::InventoryManager, HashSet::from([Permission::ManageInventory]));
        table.insert(Role::CategoryManager, HashSet::from([Permission::ManageCategories]));
        table.insert(Role::UserManager, HashSet::from([Permission::ManageUsers]));
        table.insert(Role::Customer, HashSet::new());
        table
    };
}

/// Deduplicated set of roles held by a user.
///
/// Parsed leniently from comma (or whitespace) delimited text; written back
/// sorted and comma-joined so the stored column is always normalised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    /// Parses delimited role text. Unknown tags are dropped with a warning.
    pub fn parse(raw: &str) -> Self {
        let mut roles = BTreeSet::new();
        for tag in raw
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            match Role::from_str(tag) {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => warn!(tag, "ignoring unknown role tag"),
            }
        }
        Self(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }

    pub fn has_admin_role(&self) -> bool {
        self.0.iter().any(Role::is_admin)
    }

    pub fn is_super_admin(&self) -> bool {
        self.contains(Role::SuperAdmin)
    }

    /// Expands the set through `ROLE_PERMISSIONS`.
    pub fn permissions(&self) -> BTreeSet<Permission> {
        self.0
            .iter()
            .filter_map(|role| ROLE_PERMISSIONS.get(role))
            .flat_map(|perms| perms.iter().copied())
            .collect()
    }

    /// Normalised storage form: sorted, comma-joined.
    pub fn to_storage(&self) -> String {
        let mut names: Vec<&str> = self.0.iter().map(|r| r.as_ref()).collect();
        names.sort_unstable();
        names.join(",")
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage())
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_deduplicates() {
        let set = RoleSet::parse(" Product_Manager, product_manager ,ORDER_MANAGER");
        assert_eq!(set.iter().count(), 2);
        assert!(set.contains(Role::ProductManager));
        assert!(set.contains(Role::OrderManager));
    }

    #[test]
    fn parse_drops_unknown_tags() {
        let set = RoleSet::parse("customer,wizard,,");
        assert_eq!(set, RoleSet::single(Role::Customer));
    }

    #[test]
    fn storage_form_is_sorted() {
        let set = RoleSet::parse("user_manager,category_manager");
        assert_eq!(set.to_storage(), "category_manager,user_manager");
        assert_eq!(RoleSet::parse(&set.to_storage()), set);
    }

    #[test]
    fn customer_has_no_permissions() {
        assert!(RoleSet::single(Role::Customer).permissions().is_empty());
    }

    #[test]
    fn logs_view_is_only_granted_to_super_admin() {
        for role in Role::iter() {
            let grants_logs = RoleSet::single(role)
                .permissions()
                .contains(&Permission::ViewLogs);
            assert_eq!(grants_logs, role == Role::SuperAdmin, "{role}");
        }
    }

    #[test]
    fn admin_roles_exclude_customer() {
        let admin = Role::admin_roles();
        assert_eq!(admin.len(), 6);
        assert!(!admin.contains(&Role::Customer));
    }
}
