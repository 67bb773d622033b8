pub mod booking;
pub mod service;
pub mod time_slot;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use service::Service;
pub use time_slot::TimeSlot;
pub use user::{Identity, Profile, Role, Session};
