pub mod flocking;
pub mod obstacles;
pub mod pursuit;
pub mod stuck_escape;
