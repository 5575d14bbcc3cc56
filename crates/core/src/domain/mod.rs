pub mod chunk;
pub mod message;
pub mod session;
pub mod tenant;
pub mod ticket;
