pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod event_time;
pub mod events;
pub mod notify;
pub mod scheduler;
pub mod state;
