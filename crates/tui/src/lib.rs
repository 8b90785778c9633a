mod app;
pub mod event;
mod ui;

pub use app::App;
