//! Domain models for the clinic-rx client.

mod identity;
mod medication;
mod patient;
mod prescription;

pub use identity::*;
pub use medication::*;
pub use patient::*;
pub use prescription::*;
