mod verifier_store_redis;

pub use verifier_store_redis::*;
