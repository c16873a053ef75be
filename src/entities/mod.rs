pub mod cart;
pub mod cart_item;
pub mod category;
pub mod inventory;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;
pub mod warehouse;
