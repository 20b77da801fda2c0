//! Wire codecs for the two `$batch` dialects

pub mod json;
pub mod multipart;

pub use json::{version_root, JsonBatchCodec, GRAPH_BATCH_LIMIT};
pub use multipart::MultipartBatchCodec;
