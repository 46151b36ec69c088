// Domain layer: models, pure business rules and ports. No I/O here.

pub mod hours;
pub mod model;
pub mod notifications;
pub mod ports;
pub mod pricing;
pub mod session;
pub mod wizard;
