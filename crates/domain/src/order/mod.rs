//! Order aggregate and its value objects.

pub mod model;
pub mod status;
pub mod value_objects;

pub use model::Order;
