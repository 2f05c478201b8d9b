use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::driveways::{DrivewayCreateDBRequest, DrivewayDBResponse},
    },
    types::{DrivewayId, abbrev_uuid},
};

const DRIVEWAY_COLUMNS: &str = "id, owner_id, title, address, is_active, is_available, price_per_hour, capacity, created_at, updated_at";

pub struct Driveways<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Driveways<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    pub async fn create(&mut self, request: &DrivewayCreateDBRequest) -> Result<DrivewayDBResponse> {
        let query = format!(
            r#"
            INSERT INTO driveways (owner_id, title, address, price_per_hour, capacity, is_active, is_available)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DRIVEWAY_COLUMNS}
            "#
        );

        let driveway = sqlx::query_as::<_, DrivewayDBResponse>(&query)
            .bind(request.owner_id)
            .bind(&request.title)
            .bind(&request.address)
            .bind(request.price_per_hour)
            .bind(request.capacity)
            .bind(request.is_active)
            .bind(request.is_available)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(driveway)
    }

    #[instrument(skip(self), fields(driveway_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: DrivewayId) -> Result<Option<DrivewayDBResponse>> {
        let query = format!("SELECT {DRIVEWAY_COLUMNS} FROM driveways WHERE id = $1");

        let driveway = sqlx::query_as::<_, DrivewayDBResponse>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(driveway)
    }

    /// Fetch the driveway and hold a row lock on it until the surrounding transaction ends.
    ///
    /// Every booking transaction for a driveway takes this lock before counting overlaps, so
    /// concurrent count-then-insert sequences on the same driveway run one after another.
    /// Must be called on a transaction; on a bare connection the lock is released immediately.
    #[instrument(skip(self), fields(driveway_id = %abbrev_uuid(&id)), err)]
    pub async fn lock_for_booking(&mut self, id: DrivewayId) -> Result<Option<DrivewayDBResponse>> {
        let query = format!("SELECT {DRIVEWAY_COLUMNS} FROM driveways WHERE id = $1 FOR UPDATE");

        let driveway = sqlx::query_as::<_, DrivewayDBResponse>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(driveway)
    }
}
