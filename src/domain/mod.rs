// Domain layer: query/record models and the lookup port the adapters implement.

pub mod model;
pub mod ports;
