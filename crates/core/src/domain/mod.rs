pub mod gem;
pub mod group;
pub mod team;
pub mod user;
