mod session;
mod token;
mod verifier;

pub use session::*;
pub use token::*;
pub use verifier::*;
