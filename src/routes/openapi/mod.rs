mod handler;

pub use handler::{document, openapi_document};
