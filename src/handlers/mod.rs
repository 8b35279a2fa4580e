// handlers/mod.rs
//
// public:    GET /, GET /health, route fallbacks
// protected: POST /api/upload (session resolved by the SessionUser extractor)
pub mod health;
pub mod upload;

pub use upload::{UploadAck, UPLOAD_SUCCESS_MESSAGE};
