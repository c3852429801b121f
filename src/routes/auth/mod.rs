mod handler;

pub use handler::disabled;
