//! Application services: use-case implementations.

pub mod dispatcher;
pub mod profile_adapter;
pub mod reconciler;
pub mod wireless_queue;

pub use dispatcher::Dispatcher;
pub use profile_adapter::ProfileAdapter;
pub use reconciler::{Reconciler, normalize};
pub use wireless_queue::WirelessQueue;
