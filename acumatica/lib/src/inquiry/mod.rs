//! Generic inquiries exposed through the OData endpoint.

mod metadata;
mod service;

pub use metadata::{InquiryField, InquirySpec, parse_metadata};
pub use service::Inquiries;
