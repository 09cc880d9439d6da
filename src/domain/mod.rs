// Domain layer: models, code tables and ports (interfaces). No HTTP or storage here.

pub mod codes;
pub mod model;
pub mod ports;
