//! SeaORM entities for the Cupon site.
//! Table and column names keep the original Spanish schema; the Rust side
//! uses English field names.

pub mod city;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::city::Entity as City;
    pub use super::user::Entity as User;
}
