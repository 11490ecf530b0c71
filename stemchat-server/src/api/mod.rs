//! HTTP API handlers for stemchat-server

pub mod files;
pub mod health;
pub mod session;
pub mod ui;

pub use files::file_routes;
pub use health::health_routes;
pub use session::session_routes;
pub use ui::ui_routes;
