//! Session acquisition from the upstream web app.
//!
//! One page GET per relayed call: the security token, build label and the
//! locally generated flow parameters are pulled out of the returned markup
//! and bundled with the cookie-carrying client that fetched it.

pub mod http_client;
pub mod session;
pub mod token;

pub use session::{acquire, ScrapedSession};
