// Strongbox — Auth Module
//
// Session tokens and the gate that turns an inbound credential (password
// pair or bearer token) into a verified identity.

mod error;
mod gate;
mod tokens;

pub use error::AuthError;
pub use gate::AuthGate;
pub use tokens::{Claims, TokenPair, TokenService};
