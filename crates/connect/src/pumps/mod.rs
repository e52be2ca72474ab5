//! Background tasks driving one wallet socket.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
