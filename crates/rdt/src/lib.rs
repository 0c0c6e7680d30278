pub mod checksum;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod reno;
pub mod sender;

pub use error::{RdtError, Result};
pub use packet::{Flags, Packet};
pub use receiver::Receiver;
pub use reno::{CongestionController, CongestionState, Event};
pub use sender::{Sender, segments_from_bytes};
