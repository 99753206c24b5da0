// handlers/mod.rs - gateway handlers
//
// health: liveness probe, mounted outside the route gate
// page:   page shell for navigations the gate lets through
// proxy:  reverse proxy to the backend and object storage (gate bypass paths)

pub mod health;
pub mod page;
pub mod proxy;

pub use health::health;
pub use page::page_shell;
