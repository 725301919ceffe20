pub mod channel;
pub mod lookup;
pub mod protocol;

pub use channel::{spawn_channel, ChannelHandle, ReconnectPolicy};
pub use lookup::Lookups;
pub use protocol::{Incoming, IncomingKind};
