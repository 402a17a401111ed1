//! Wire codecs: the canonical query string, the encrypted request envelope,
//! and the `{Status, Message, Result}` response wrapper.

pub mod canonical;
pub mod envelope;
pub mod response;

pub use canonical::{encode, EncodeError};
pub use envelope::Envelope;
pub use response::{GatewayReply, GatewayResponse, GatewayStatus};
