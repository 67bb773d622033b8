pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod gateway;
pub mod session;
pub mod slots;
pub mod wizard;
