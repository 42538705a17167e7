//! Domain types shared by the repositories, services and routes.
//!
//! These types represent validated domain objects separate from database row types.

pub mod order;
pub mod store;

pub use order::{NewOrder, OrderView, PrintOrder};
pub use store::{NewStore, Store, StoreProfile};
