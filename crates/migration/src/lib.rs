pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_draws_table;
mod m20240301_000002_create_source_bindings_table;
mod m20240301_000003_create_entries_table;
mod m20240301_000004_create_winners_table;
mod m20240301_000005_create_publish_assets_table;

pub(crate) use m20240301_000001_create_draws_table::Draws;
pub(crate) use m20240301_000003_create_entries_table::Entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_draws_table::Migration),
            Box::new(m20240301_000002_create_source_bindings_table::Migration),
            Box::new(m20240301_000003_create_entries_table::Migration),
            Box::new(m20240301_000004_create_winners_table::Migration),
            Box::new(m20240301_000005_create_publish_assets_table::Migration),
        ]
    }
}
