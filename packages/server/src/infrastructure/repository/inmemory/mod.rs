//! In-memory stand-ins for the relational stores.
//!
//! Used by the development binary and by tests. A SQL-backed implementation
//! only needs to implement the same domain traits.

pub mod appointment;
pub mod message;

pub use appointment::InMemoryAppointmentStore;
pub use message::InMemoryMessageStore;
