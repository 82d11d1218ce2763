pub mod admin;
pub mod entry_log;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scan;
pub mod tickets;

pub use routes::create_router;
