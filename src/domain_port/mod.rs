mod verifier_store;

pub use verifier_store::*;
