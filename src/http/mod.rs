//! HTTP protocol layer module
//!
//! Protocol helpers shared by the dispatcher, the asset store and the server glue.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

pub use range::parse_range_header;
pub use response::{
    build_301_response, build_304_response, build_400_response, build_404_response,
    build_405_response, build_413_response, build_416_response, build_500_response,
    build_502_response, build_504_response, build_options_response,
};
