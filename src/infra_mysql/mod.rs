mod verifier_store_mysql;

pub use verifier_store_mysql::*;
