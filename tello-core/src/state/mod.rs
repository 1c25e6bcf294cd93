pub mod connection;

pub use connection::{ConnectionState, ConnectionStateMachine, Effect};
