pub mod default_route;
pub mod duplicate_route;
pub mod lead_route;
