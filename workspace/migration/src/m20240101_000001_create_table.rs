use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create ciudad table
        manager
            .create_table(
                Table::create()
                    .table(Ciudad::Table)
                    .if_not_exists()
                    .col(pk_auto(Ciudad::Id))
                    .col(string_len(Ciudad::Nombre, 100))
                    .col(string_len(Ciudad::Slug, 100).unique_key())
                    .to_owned(),
            )
            .await?;

        // Create usuario table
        manager
            .create_table(
                Table::create()
                    .table(Usuario::Table)
                    .if_not_exists()
                    .col(pk_auto(Usuario::Id))
                    .col(string_len(Usuario::Nombre, 100))
                    .col(string_len(Usuario::Apellidos, 255))
                    .col(string_len(Usuario::Email, 255).unique_key())
                    .col(string_len(Usuario::Password, 255))
                    .col(string_len(Usuario::Salt, 255))
                    .col(text(Usuario::Direccion))
                    .col(boolean(Usuario::PermiteEmail))
                    .col(timestamp_with_time_zone(Usuario::FechaAlta))
                    .col(date(Usuario::FechaNacimiento))
                    .col(string_len(Usuario::Dni, 9))
                    .col(string_len(Usuario::NumeroTarjeta, 20))
                    .col(integer_null(Usuario::CiudadId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usuario_ciudad")
                            .from(Usuario::Table, Usuario::CiudadId)
                            .to(Ciudad::Table, Ciudad::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usuario_ciudad")
                    .table(Usuario::Table)
                    .col(Usuario::CiudadId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(Usuario::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Ciudad::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Ciudad {
    Table,
    Id,
    Nombre,
    Slug,
}

#[derive(DeriveIden)]
enum Usuario {
    Table,
    Id,
    Nombre,
    Apellidos,
    Email,
    Password,
    Salt,
    Direccion,
    PermiteEmail,
    FechaAlta,
    FechaNacimiento,
    Dni,
    NumeroTarjeta,
    CiudadId,
}
