//! Push-channel connection handling.

mod manager;
mod policy;
mod scheduler;
mod state;
mod stomp;
mod transport;

pub use manager::ConnectionManager;
pub use policy::ReconnectPolicy;
pub use scheduler::{Scheduler, TokioScheduler};
pub use state::ConnectionState;
pub use stomp::{StompFrame, StompTransport};
pub use transport::{notification_destination, PushLink, PushTransport};
