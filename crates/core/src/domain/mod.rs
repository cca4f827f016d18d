pub mod event;
pub mod identity;
pub mod reply;
pub mod session;
