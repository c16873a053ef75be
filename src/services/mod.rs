// Catalog and stock
pub mod catalog;
pub mod inventory;

// Customer-facing
pub mod cart;

// Back office
pub mod bulk_import;
pub mod orders;
pub mod users;
