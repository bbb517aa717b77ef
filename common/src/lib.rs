mod db;
mod gateway;
mod helpers;
mod schema;

pub use db::*;
pub use gateway::*;
pub use helpers::*;
pub use schema::*;
