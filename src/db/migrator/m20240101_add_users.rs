use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Bootstrap accounts seeded on first run. These are an operational
/// convenience for fresh installs, not a security boundary.
const SEED_ACCOUNTS: [(&str, &str, &str, &str); 2] = [
    ("admin", "admin@example.com", "admin123", "admin"),
    ("user", "user@example.com", "password", "user"),
];

fn hash_seed_password(password: &str) -> String {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
    };

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash seed password")
        .to_string()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let now = chrono::Utc::now().to_rfc3339();

        for (username, email, password, role) in SEED_ACCOUNTS {
            let password_hash = hash_seed_password(password);

            let insert = sea_orm_migration::sea_query::Query::insert()
                .into_table(Users)
                .columns([
                    crate::entities::users::Column::Username,
                    crate::entities::users::Column::Email,
                    crate::entities::users::Column::PasswordHash,
                    crate::entities::users::Column::Role,
                    crate::entities::users::Column::CreatedAt,
                    crate::entities::users::Column::UpdatedAt,
                ])
                .values_panic([
                    username.into(),
                    email.into(),
                    password_hash.into(),
                    role.into(),
                    now.clone().into(),
                    now.clone().into(),
                ])
                .to_owned();

            manager.exec_stmt(insert).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
