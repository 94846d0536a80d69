mod verifier_store_memory;

pub use verifier_store_memory::*;
