//! C7: typed HTTP clients for the two send providers and the PDF
//! collaborator, built on the shared `request` primitive (spec.md §4.7).

pub mod error;
pub mod mandrill;
pub mod messagebird;
pub mod pdf;
pub mod request;

pub use error::ApiError;
pub use mandrill::MandrillClient;
pub use messagebird::MessageBirdClient;
pub use pdf::PdfClient;
