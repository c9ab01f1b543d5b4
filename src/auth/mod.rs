mod helpers;
mod middleware;
mod token;

pub use middleware::{ACT_AS_HEADER, ActingUser, AuthError, RequireAdmin, RequireAuth};
pub use token::{GeneratedToken, TokenGenerator, issue_token, parse_token};
