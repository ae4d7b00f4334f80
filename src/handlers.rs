pub mod cities;
pub mod health;
pub mod users;
