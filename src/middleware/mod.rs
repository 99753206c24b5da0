pub mod gate;
pub mod response;

pub use gate::route_gate_middleware;
pub use response::ApiResponse;
