pub mod entities;
pub mod principal;
pub mod validation;

// Re-export tracing for use in this crate
pub use tracing;

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, QueryFilter, Set,
    };

    use super::*;
    use entities::prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        // Apply the real schema
        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn user(email: &str, city_id: Option<i32>) -> entities::user::ActiveModel {
        entities::user::ActiveModel {
            first_name: Set("Javier".to_string()),
            last_name: Set("Eguiluz".to_string()),
            email: Set(email.to_string()),
            password: Set("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string()),
            salt: Set("c2FsdA".to_string()),
            allows_email: Set(true),
            address: Set("Gran Vía 10, Madrid".to_string()),
            birth_date: Set(NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()),
            dni: Set("00000000T".to_string()),
            card_number: Set("12345678901".to_string()),
            city_id: Set(city_id),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        // Setup database
        let db = setup_db().await?;

        // Create cities
        let madrid = entities::city::ActiveModel {
            name: Set("Madrid".to_string()),
            slug: Set("madrid".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let barcelona = entities::city::ActiveModel {
            name: Set("Barcelona".to_string()),
            slug: Set("barcelona".to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Create users
        let user1 = user("user1@example.com", Some(madrid.id)).insert(&db).await?;
        let user2 = user("user2@example.com", Some(madrid.id)).insert(&db).await?;
        let user3 = user("user3@example.com", None).insert(&db).await?;

        // Verify cities
        let cities = City::find().all(&db).await?;
        assert_eq!(cities.len(), 2);
        assert!(cities.iter().any(|c| c.slug == "madrid"));
        assert!(cities.iter().any(|c| c.slug == "barcelona"));

        // Verify users
        let users = User::find().all(&db).await?;
        assert_eq!(users.len(), 3);

        // Users of a city, through the foreign key
        let madrid_users = User::find()
            .filter(entities::user::Column::CityId.eq(madrid.id))
            .all(&db)
            .await?;
        assert_eq!(madrid_users.len(), 2);
        assert!(madrid_users.iter().all(|u| u.id != user3.id));

        // Same thing through the Related trait
        let related = madrid.find_related(User).all(&db).await?;
        assert_eq!(related.len(), 2);
        assert!(barcelona.find_related(User).all(&db).await?.is_empty());

        // And from the user side
        let city = user1.find_related(City).one(&db).await?;
        assert_eq!(city.map(|c| c.id), Some(madrid.id));

        // Deleting a city leaves its users without one
        City::delete_by_id(madrid.id).exec(&db).await?;
        let reloaded = User::find_by_id(user2.id).one(&db).await?.unwrap();
        assert_eq!(reloaded.city_id, None);

        // The migration enforces unique emails
        let duplicate = user("user1@example.com", None).insert(&db).await;
        assert!(duplicate.is_err());

        Ok(())
    }
}
