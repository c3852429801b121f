mod handler;
mod model;

pub use handler::invalidate;
pub use model::InvalidateCardResponse;
