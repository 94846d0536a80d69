mod auth_service_impl;
mod token_codec_jwt;
mod verifier_hasher_argon2;

pub use auth_service_impl::*;
pub use token_codec_jwt::*;
pub use verifier_hasher_argon2::*;
