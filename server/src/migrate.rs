use std::collections::HashSet;

use bson::oid::ObjectId;
use mongodb::{options::IndexOptions, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{app::AppState, mongo_ext::Collection};

pub const BOOKING_IDENTITY_INDEX: &str = "booking_identity";

#[derive(Serialize, Deserialize)]
pub struct MigrateModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub version: i64,
}

#[derive(Clone)]
pub struct MigrationCollection(pub Collection<MigrateModel>);

impl std::ops::Deref for MigrationCollection {
    type Target = Collection<MigrateModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MigrationCollection {
    pub async fn insert_version(&self, version: i64) -> Result<(), mongodb::error::Error> {
        self.insert_one(
            MigrateModel {
                id: ObjectId::new(),
                version,
            },
            None,
        )
        .await
        .map(|_| ())
    }
}

impl AppState {
    async fn v1_migrate(&self) -> Result<(), mongodb::error::Error> {
        self.migrate_collection
            .create_index(
                IndexModel::builder()
                    .keys(bson::doc! {"version": 1})
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        // One booking per patient, treatment and date.
        self.booking_collection
            .create_index(
                IndexModel::builder()
                    .keys(bson::doc! {
                        "treatment": 1,
                        "date": 1,
                        "patientEmail": 1,
                    })
                    .options(
                        IndexOptions::builder()
                            .name(BOOKING_IDENTITY_INDEX.to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        self.user_collection
            .create_index(
                IndexModel::builder()
                    .keys(bson::doc! {"email": 1})
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }

    async fn get_all_migration(&self) -> Result<Vec<MigrateModel>, mongodb::error::Error> {
        let mut cursor = self.migrate_collection.find(None, None).await?;

        let mut vec = vec![];

        while cursor.advance().await? {
            vec.push(cursor.deserialize_current()?);
        }

        Ok(vec)
    }

    /// Applies every migration not yet recorded in the `migrations` collection.
    pub async fn run_migration(&self) -> Result<(), mongodb::error::Error> {
        let migration: HashSet<i64> = self
            .get_all_migration()
            .await?
            .into_iter()
            .map(|it| it.version)
            .collect();

        macro_rules! migrate {
            ($version:expr, $fun:ident) => {
                if !migration.contains(&$version) {
                    tracing::info!("running migration version {}", $version);
                    self.$fun().await?;
                    self.migrate_collection.insert_version($version).await?;
                }
            };
        }

        migrate!(1_i64, v1_migrate);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::tests::bootstrap;

    use super::*;

    #[tokio::test]
    #[ignore = "requires a running MongoDB at MONGODB_URI"]
    async fn test_migration_is_recorded_once() {
        let bootstrap = bootstrap().await;

        bootstrap.app_state.run_migration().await.unwrap();

        let versions = bootstrap.app_state.get_all_migration().await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);

        let indexes = bootstrap
            .app_state
            .booking_collection
            .list_index_names()
            .await
            .unwrap();
        assert!(indexes.contains(&BOOKING_IDENTITY_INDEX.to_string()));
    }
}
