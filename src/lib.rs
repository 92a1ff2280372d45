pub mod api;
pub mod error;
pub mod fetcher;
pub mod poller;
pub mod reconciler;
pub mod schemas;
pub mod session;
pub mod settings;
pub mod store;
pub mod submit;
