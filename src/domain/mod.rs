// Domain layer: helpdesk entities, export rows and the ports the jobs depend on.

pub mod model;
pub mod ports;
