/*!
 * # Permissions Module
 *
 * Capabilities checked by the admin surface. Each permission covers one
 * resource family as a whole; there is no finer action split.
 */

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

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
pub enum Permission {
    #[strum(serialize = "products:manage")]
    #[serde(rename = "products:manage")]
    ManageProducts,
    #[strum(serialize = "categories:manage")]
    #[serde(rename = "categories:manage")]
    ManageCategories,
    #[strum(serialize = "orders:manage")]
    #[serde(rename = "orders:manage")]
    ManageOrders,
    #[strum(serialize = "inventory:manage")]
    #[serde(rename = "inventory:manage")]
    ManageInventory,
    #[strum(serialize = "users:manage")]
    #[serde(rename = "users:manage")]
    ManageUsers,
    #[strum(serialize = "logs:view")]
    #[serde(rename = "logs:view")]
    ViewLogs,
}

impl Permission {
    pub fn all() -> Vec<Permission> {
        Permission::iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn permission_strings_round_trip() {
        for permission in Permission::iter() {
            let text = permission.to_string();
            assert_eq!(Permission::from_str(&text).unwrap(), permission);
        }
        assert_eq!(Permission::ViewLogs.as_ref(), "logs:view");
    }

    #[test]
    fn serde_uses_colon_form() {
        let json = serde_json::to_string(&Permission::ManageInventory).unwrap();
        assert_eq!(json, "\"inventory:manage\"");
    }
}
