pub mod actor;
pub mod ad_handlers;
pub mod app;
pub mod billing;
pub mod db;
pub mod gateway;
pub mod inventory;
pub mod invoice;
pub mod khatabook_handlers;
pub mod order_handlers;
pub mod product_handlers;
pub mod settlement_handlers;

pub use app::{build_router, AppState};
