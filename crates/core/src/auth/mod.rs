//! Authentication behaviors
//!
//! Bearer tokens are cached per authority, request digests per web URL. Both
//! caches are explicit service objects: share one instance across queryables
//! to share its entries.

pub mod bearer;
pub mod digest;

pub use bearer::{AccessToken, BearerAuth, BearerToken, TokenCache, TokenProvider};
pub use digest::{web_url_of, Digest, DigestCache, DigestSource, RequestDigest};
