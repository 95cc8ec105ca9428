//! CoT stream protocol: framing and the control-document handshake.
//!
//! TAK servers speak Cursor-on-Target over a raw TLS byte stream with no
//! length prefix and no record delimiter: documents are concatenated
//! back-to-back and delimited only by their own `<event>`/`</event>` tags.
//! TCP may split, merge, or partially deliver documents arbitrarily, so the
//! stream is reassembled in two stages:
//!
//! ```text
//! raw bytes ──> FrameBuffer ──> complete document ──> classify()
//!                  │                                     │
//!                  └ partial fragment retained           ├─ Reply(pong)     (internal)
//!                                                        ├─ ServerVersion   (internal)
//!                                                        ├─ Forward(event)  (to consumer)
//!                                                        └─ Discard         (malformed)
//! ```
//!
//! ## Control documents
//!
//! Two `type` values are protocol-internal and never reach consumers:
//!
//! | Type          | Meaning                  | Reaction                     |
//! |---------------|--------------------------|------------------------------|
//! | `t-x-c-t-r`   | Keepalive request        | Queue a payload-free reply   |
//! | `t-x-takp-v`  | Server version announce  | Record the server version    |
//!
//! Every other type is an opaque application document, forwarded verbatim.

mod frame;
mod handshake;

pub use frame::FrameBuffer;
pub use handshake::{classify, Reaction};

/// Type attribute of a server keepalive request.
pub const TYPE_KEEPALIVE_REQUEST: &str = "t-x-c-t-r";

/// Type attribute of the keepalive reply sent back to the server.
pub const TYPE_KEEPALIVE_REPLY: &str = "t-x-c-t";

/// Type attribute of the server version announcement.
pub const TYPE_VERSION_ANNOUNCE: &str = "t-x-takp-v";
