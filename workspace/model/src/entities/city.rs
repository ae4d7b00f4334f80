use sea_orm::entity::prelude::*;
use sea_orm::{QueryFilter, QueryOrder};

/// A city where deals are published. Users pick one as their home city.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "ciudad")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_name = "nombre", column_type = "String(StringLen::N(100))")]
    pub name: String,
    /// URL-friendly identifier, e.g. "madrid".
    #[sea_orm(unique, column_type = "String(StringLen::N(100))")]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A city has many users. The foreign key lives on the user side.
    #[sea_orm(has_many = "super::user::Entity")]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Loads the users living in this city, ordered by id.
    pub async fn users<C>(&self, db: &C) -> Result<Vec<super::user::Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        super::user::Entity::find()
            .filter(super::user::Column::CityId.eq(self.id))
            .order_by_asc(super::user::Column::Id)
            .all(db)
            .await
    }

    pub async fn find_by_slug<C>(db: &C, slug: &str) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find().filter(Column::Slug.eq(slug)).one(db).await
    }
}
