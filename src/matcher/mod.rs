//! Matching strategies
//!
//! One matcher per input family (parts, vehicles), each a ladder of
//! strategies over its read-only index. Strategy panics are demoted to
//! per-record `EXCEPTION_ERROR` results; they never abort a batch.

pub mod parts;
pub mod vehicle;
pub mod vin;

pub use parts::PartsMatcher;
pub use vehicle::VehicleMatcher;
pub use vin::{TableVinDecoder, VinDecoded, VinDecoder};

/// Human-readable message from a caught strategy panic.
pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "strategy panicked".to_string()
    }
}
