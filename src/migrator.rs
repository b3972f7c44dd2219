use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_organizations_table::Migration),
            Box::new(m20240101_000002_create_entities_table::Migration),
            Box::new(m20240101_000003_create_metadata_table::Migration),
            Box::new(m20240101_000004_add_entity_uniqueness::Migration),
        ]
    }
}

mod m20240101_000001_create_organizations_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_organizations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Organizations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Organizations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Organizations::Name).string().not_null())
                        .col(
                            ColumnDef::new(Organizations::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Organizations::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Organizations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Organizations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Organizations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Organizations {
        Table,
        Id,
        Name,
        Code,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_entities_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_entities_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Entities::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Entities::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Entities::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(Entities::EntityType).string().not_null())
                        .col(ColumnDef::new(Entities::EntitySubtype).string().null())
                        .col(ColumnDef::new(Entities::EntityName).string().not_null())
                        .col(ColumnDef::new(Entities::EntityCode).string().null())
                        .col(ColumnDef::new(Entities::RelatedEntityId).uuid().null())
                        .col(
                            ColumnDef::new(Entities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Entities::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_entities_org_type")
                        .table(Entities::Table)
                        .col(Entities::OrganizationId)
                        .col(Entities::EntityType)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_entities_related")
                        .table(Entities::Table)
                        .col(Entities::OrganizationId)
                        .col(Entities::RelatedEntityId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Entities::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Entities {
        Table,
        Id,
        OrganizationId,
        EntityType,
        EntitySubtype,
        EntityName,
        EntityCode,
        RelatedEntityId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_metadata_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_metadata_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Metadata::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Metadata::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Metadata::OrganizationId).uuid().not_null())
                        .col(ColumnDef::new(Metadata::EntityType).string().not_null())
                        .col(ColumnDef::new(Metadata::EntityId).uuid().not_null())
                        .col(ColumnDef::new(Metadata::MetadataType).string().not_null())
                        .col(ColumnDef::new(Metadata::MetadataKey).string().not_null())
                        .col(ColumnDef::new(Metadata::MetadataValue).json().not_null())
                        .col(
                            ColumnDef::new(Metadata::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Metadata::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Metadata::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One current record per (tenant, entity type, entity, key)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_metadata_entity_key")
                        .table(Metadata::Table)
                        .col(Metadata::OrganizationId)
                        .col(Metadata::EntityType)
                        .col(Metadata::EntityId)
                        .col(Metadata::MetadataKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Metadata::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Metadata {
        Table,
        Id,
        OrganizationId,
        EntityType,
        EntityId,
        MetadataType,
        MetadataKey,
        MetadataValue,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_add_entity_uniqueness {
    use sea_orm_migration::prelude::*;
    use sea_orm_migration::sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_add_entity_uniqueness"
        }
    }

    /// At most one open time entry per staff member. Partial indexes have the
    /// same syntax on SQLite and Postgres.
    const ACTIVE_TIME_ENTRY_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS uq_entities_active_time_entry \
         ON entities (organization_id, related_entity_id) \
         WHERE entity_type = 'time_entry' AND entity_subtype = 'active'";

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // NULL codes never collide
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_entities_org_type_code")
                        .table(Entities::Table)
                        .col(Entities::OrganizationId)
                        .col(Entities::EntityType)
                        .col(Entities::EntityCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .get_connection()
                .execute_unprepared(ACTIVE_TIME_ENTRY_INDEX)
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .get_connection()
                .execute_unprepared("DROP INDEX IF EXISTS uq_entities_active_time_entry")
                .await?;
            manager
                .drop_index(
                    Index::drop()
                        .name("uq_entities_org_type_code")
                        .table(Entities::Table)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Entities {
        Table,
        OrganizationId,
        EntityType,
        EntityCode,
    }
}
