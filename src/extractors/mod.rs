//! Request extractors: authenticated identity, JSON bodies, query strings and path segments.

mod body;
mod identity;
mod params;

pub use body::JsonBody;
pub use identity::{session_token, CurrentUser, TOKEN_COOKIE};
pub use params::{PathParams, QueryParams};
