pub mod health;
pub mod oauth;
pub mod projects;
pub mod tags;
