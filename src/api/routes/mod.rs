pub mod bus;
pub mod health;
pub mod logs;
pub mod memory;
pub mod nodes;
