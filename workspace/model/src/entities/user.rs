use std::fmt;

use chrono::{NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, QueryFilter, Set, Value};
use tracing::{debug, trace, warn};

use crate::principal::{Principal, ROLE_USER};
use crate::validation::{self, UserFields, Violation};

/// A registered user of the site.
///
/// Column names follow the original `usuario` table. The email doubles
/// as the login name and is unique across all users.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "usuario")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_name = "nombre", column_type = "String(StringLen::N(100))")]
    pub first_name: String,
    #[sea_orm(column_name = "apellidos", column_type = "String(StringLen::N(255))")]
    pub last_name: String,
    #[sea_orm(unique, column_type = "String(StringLen::N(255))")]
    pub email: String,
    /// Password hash in PHC string format. Never the plaintext.
    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub password: String,
    /// Salt used to derive `password`.
    #[sea_orm(column_type = "String(StringLen::N(255))")]
    pub salt: String,
    /// Consent to receive marketing email.
    #[sea_orm(column_name = "permite_email")]
    pub allows_email: bool,
    #[sea_orm(column_name = "direccion", column_type = "Text")]
    pub address: String,
    /// Set when the record is constructed.
    #[sea_orm(column_name = "fecha_alta")]
    pub registered_at: DateTimeUtc,
    #[sea_orm(column_name = "fecha_nacimiento")]
    pub birth_date: Date,
    /// Spanish national ID: up to 8 digits and a check letter.
    #[sea_orm(column_type = "String(StringLen::N(9))")]
    pub dni: String,
    #[sea_orm(column_name = "numero_tarjeta", column_type = "String(StringLen::N(20))")]
    pub card_number: String,
    #[sea_orm(column_name = "ciudad_id")]
    pub city_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user optionally lives in one city.
    #[sea_orm(
        belongs_to = "super::city::Entity",
        from = "Column::CityId",
        to = "super::city::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    City,
}

impl Related<super::city::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::City.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Stamps the registration time. `ActiveModel::default()` goes through here too.
    fn new() -> Self {
        Self {
            registered_at: Set(Utc::now()),
            ..<Self as ActiveModelTrait>::default()
        }
    }

    /// Refuses to write a record whose assigned fields break an entity rule.
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let violations = self.validate(Utc::now().date_naive());
        if violations.is_empty() {
            trace!("User record passed validation (insert: {})", insert);
            return Ok(self);
        }

        warn!("Refusing to save user record: {} violation(s)", violations.len());
        let summary: Vec<String> = violations.iter().map(Violation::to_string).collect();
        Err(DbErr::Custom(format!(
            "user validation failed: {}",
            summary.join("; ")
        )))
    }
}

fn assigned<V>(value: &ActiveValue<V>) -> Option<&V>
where
    V: Into<Value>,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v),
        ActiveValue::NotSet => None,
    }
}

impl ActiveModel {
    /// Runs the entity rules on every assigned field. Fields left `NotSet`,
    /// as in a partial update, are skipped.
    pub fn validate(&self, today: NaiveDate) -> Vec<Violation> {
        let fields = UserFields {
            first_name: assigned(&self.first_name).map(String::as_str),
            last_name: assigned(&self.last_name).map(String::as_str),
            address: assigned(&self.address).map(String::as_str),
            email: assigned(&self.email).map(String::as_str),
            dni: assigned(&self.dni).map(String::as_str),
            card_number: assigned(&self.card_number).map(String::as_str),
            birth_date: assigned(&self.birth_date).copied(),
        };
        debug!("Validating user record (id: {:?})", assigned(&self.id));

        validation::validate_user_fields(&fields, today)
    }
}

impl Model {
    /// Whether the user is at least 18 years old on `today`.
    pub fn is_adult(&self, today: NaiveDate) -> bool {
        validation::is_adult(self.birth_date, today)
    }

    pub fn validate(&self, today: NaiveDate) -> Vec<Violation> {
        validation::validate_user(self, today)
    }

    /// Loads the user's city, if one is set. Never loaded implicitly.
    pub async fn city<C>(&self, db: &C) -> Result<Option<super::city::Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        match self.city_id {
            Some(city_id) => super::city::Entity::find_by_id(city_id).one(db).await,
            None => Ok(None),
        }
    }

    pub async fn find_by_email<C>(db: &C, email: &str) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().filter(Column::Email.eq(email)).one(db).await
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

impl Principal for Model {
    fn username(&self) -> &str {
        &self.email
    }

    fn roles(&self) -> &'static [&'static str] {
        &[ROLE_USER]
    }

    // Only the hash is kept on the model.
    fn erase_credentials(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::city;
    use chrono::{Duration, TimeZone};
    use sea_orm::sea_query::SqliteQueryBuilder;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, DbBackend, Schema, Statement};

    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();

        let schema = Schema::new(DbBackend::Sqlite);
        for stmt in [
            schema.create_table_from_entity(city::Entity),
            schema.create_table_from_entity(Entity),
        ] {
            let statement =
                Statement::from_string(DbBackend::Sqlite, stmt.to_string(SqliteQueryBuilder));
            db.execute(statement).await.unwrap();
        }

        db
    }

    fn valid_user(email: &str) -> ActiveModel {
        ActiveModel {
            first_name: Set("Lucía".to_string()),
            last_name: Set("García Pérez".to_string()),
            email: Set(email.to_string()),
            password: Set("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string()),
            salt: Set("c2FsdA".to_string()),
            allows_email: Set(false),
            address: Set("Calle Mayor 1, Madrid".to_string()),
            birth_date: Set(NaiveDate::from_ymd_opt(1990, 3, 15).unwrap()),
            dni: Set("12345678Z".to_string()),
            card_number: Set("4111111111111111".to_string()),
            city_id: Set(None),
            ..Default::default()
        }
    }

    async fn create_test_city(db: &DatabaseConnection, name: &str, slug: &str) -> city::Model {
        city::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[test]
    fn test_new_stamps_registration_time() {
        let before = Utc::now();
        let user = ActiveModel::new();
        let after = Utc::now();

        let registered_at = *user.registered_at.as_ref();
        assert!(registered_at >= before && registered_at <= after);
        assert!(user.id.is_not_set());
    }

    #[test]
    fn test_default_goes_through_new() {
        let user = ActiveModel::default();
        assert!(user.registered_at.is_set());
    }

    #[test]
    fn test_active_model_validate() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert!(valid_user("lucia@example.com").validate(today).is_empty());

        let mut bad = valid_user("lucia@example.com");
        bad.dni = Set("ABC123".to_string());
        let violations = bad.validate(today);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].code, "DNI_FORMAT");

        // Only the registration time is assigned
        assert!(ActiveModel::new().validate(today).is_empty());
    }

    #[tokio::test]
    async fn test_insert_round_trips_every_field() {
        let db = setup_test_db().await;
        let madrid = create_test_city(&db, "Madrid", "madrid").await;
        let registered_at = Utc.with_ymd_and_hms(2023, 11, 2, 9, 30, 0).unwrap();

        let mut user = valid_user("lucia@example.com");
        user.allows_email = Set(true);
        user.registered_at = Set(registered_at);
        user.city_id = Set(Some(madrid.id));

        let inserted = user.insert(&db).await.unwrap();
        let loaded = Entity::find_by_id(inserted.id).one(&db).await.unwrap().unwrap();

        assert_eq!(loaded, inserted);
        assert!(loaded.id > 0);
        assert_eq!(loaded.first_name, "Lucía");
        assert_eq!(loaded.last_name, "García Pérez");
        assert_eq!(loaded.email, "lucia@example.com");
        assert_eq!(loaded.password, "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA");
        assert_eq!(loaded.salt, "c2FsdA");
        assert!(loaded.allows_email);
        assert_eq!(loaded.address, "Calle Mayor 1, Madrid");
        assert_eq!(loaded.registered_at, registered_at);
        assert_eq!(loaded.birth_date, NaiveDate::from_ymd_opt(1990, 3, 15).unwrap());
        assert_eq!(loaded.dni, "12345678Z");
        assert_eq!(loaded.card_number, "4111111111111111");
        assert_eq!(loaded.city_id, Some(madrid.id));
    }

    #[tokio::test]
    async fn test_before_save_rejects_invalid_record() {
        let db = setup_test_db().await;

        let mut user = valid_user("lucia@example.com");
        user.dni = Set("12345678A".to_string());

        let err = user.insert(&db).await.unwrap_err();
        match err {
            DbErr::Custom(message) => {
                assert!(message.contains("dni"));
                assert!(message.contains(validation::DNI_CHECKSUM_MESSAGE));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert_eq!(Entity::find().all(&db).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_before_save_rejects_minor() {
        let db = setup_test_db().await;

        let mut user = valid_user("joven@example.com");
        user.birth_date = Set((Utc::now() - Duration::days(365 * 10)).date_naive());

        let err = user.insert(&db).await.unwrap_err();
        assert!(err.to_string().contains(validation::UNDERAGE_MESSAGE));
    }

    #[tokio::test]
    async fn test_update_revalidates() {
        let db = setup_test_db().await;
        let inserted = valid_user("lucia@example.com").insert(&db).await.unwrap();

        let mut active: ActiveModel = inserted.into();
        active.card_number = Set("12".to_string());

        let err = active.update(&db).await.unwrap_err();
        assert!(err.to_string().contains("card_number"));
    }

    #[tokio::test]
    async fn test_partial_update_checks_assigned_fields() {
        let db = setup_test_db().await;
        let inserted = valid_user("lucia@example.com").insert(&db).await.unwrap();

        let partial = ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(inserted.id),
            dni: Set("garbage".to_string()),
            card_number: Set("1".to_string()),
            ..<ActiveModel as ActiveModelTrait>::default()
        };
        let err = partial.update(&db).await.unwrap_err();
        assert!(err.to_string().contains(validation::DNI_FORMAT_MESSAGE));
        assert!(err.to_string().contains("card_number"));

        let stored = Entity::find_by_id(inserted.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.dni, "12345678Z");
        assert_eq!(stored.card_number, "4111111111111111");

        // A valid partial update still goes through
        let partial = ActiveModel {
            id: sea_orm::ActiveValue::Unchanged(inserted.id),
            dni: Set("00000000T".to_string()),
            ..<ActiveModel as ActiveModelTrait>::default()
        };
        let updated = partial.update(&db).await.unwrap();
        assert_eq!(updated.dni, "00000000T");
        assert_eq!(updated.email, "lucia@example.com");
    }

    #[tokio::test]
    async fn test_email_is_unique() {
        let db = setup_test_db().await;
        valid_user("lucia@example.com").insert(&db).await.unwrap();

        let duplicate = valid_user("lucia@example.com").insert(&db).await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let db = setup_test_db().await;
        let inserted = valid_user("lucia@example.com").insert(&db).await.unwrap();

        let found = Model::find_by_email(&db, "lucia@example.com").await.unwrap();
        assert_eq!(found, Some(inserted));

        let missing = Model::find_by_email(&db, "nadie@example.com").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_city_lookup_both_sides() {
        let db = setup_test_db().await;
        let madrid = create_test_city(&db, "Madrid", "madrid").await;
        let sevilla = create_test_city(&db, "Sevilla", "sevilla").await;

        let mut first = valid_user("a@example.com");
        first.city_id = Set(Some(madrid.id));
        let first = first.insert(&db).await.unwrap();

        let mut second = valid_user("b@example.com");
        second.city_id = Set(Some(madrid.id));
        let second = second.insert(&db).await.unwrap();

        let homeless = valid_user("c@example.com").insert(&db).await.unwrap();

        assert_eq!(first.city(&db).await.unwrap(), Some(madrid.clone()));
        assert_eq!(homeless.city(&db).await.unwrap(), None);

        let residents = madrid.users(&db).await.unwrap();
        assert_eq!(residents, vec![first, second]);
        assert!(sevilla.users(&db).await.unwrap().is_empty());

        let by_slug = city::Model::find_by_slug(&db, "sevilla").await.unwrap();
        assert_eq!(by_slug, Some(sevilla));
    }

    fn model(id: i32, email: &str) -> Model {
        Model {
            id,
            first_name: "Lucía".to_string(),
            last_name: "García Pérez".to_string(),
            email: email.to_string(),
            password: "hash".to_string(),
            salt: "salt".to_string(),
            allows_email: false,
            address: "Calle Mayor 1".to_string(),
            registered_at: Utc::now(),
            birth_date: NaiveDate::from_ymd_opt(1990, 3, 15).unwrap(),
            dni: "12345678Z".to_string(),
            card_number: "4111111111111111".to_string(),
            city_id: None,
        }
    }

    #[test]
    fn test_principal_identity_is_the_email() {
        let first = model(1, "lucia@example.com");
        let same_email = model(2, "lucia@example.com");
        let other = model(1, "otra@example.com");

        assert!(first.is_same_principal(&same_email));
        assert!(!first.is_same_principal(&other));
        assert_eq!(first.username(), "lucia@example.com");
        assert_eq!(first.roles(), &["ROLE_USUARIO"]);
    }

    #[test]
    fn test_erase_credentials_keeps_record() {
        let mut user = model(1, "lucia@example.com");
        let before = user.clone();
        user.erase_credentials();
        assert_eq!(user, before);
    }

    #[test]
    fn test_display_is_full_name() {
        assert_eq!(model(1, "lucia@example.com").to_string(), "Lucía García Pérez");
    }

    #[test]
    fn test_is_adult_uses_birth_date() {
        let user = model(1, "lucia@example.com");
        assert!(user.is_adult(NaiveDate::from_ymd_opt(2008, 3, 15).unwrap()));
        assert!(!user.is_adult(NaiveDate::from_ymd_opt(2008, 3, 14).unwrap()));
    }
}
