use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
    },
    types::UserId,
};

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert several notifications in one statement
    #[instrument(skip(self, requests), fields(count = requests.len()), err)]
    pub async fn create_bulk(&mut self, requests: &[NotificationCreateDBRequest]) -> Result<Vec<NotificationDBResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO notifications (user_id, kind, title, message, booking_id) ");
        builder.push_values(requests, |mut row, request| {
            row.push_bind(request.user_id)
                .push_bind(request.kind)
                .push_bind(&request.title)
                .push_bind(&request.message)
                .push_bind(request.booking_id);
        });
        builder.push(" RETURNING id, user_id, kind, title, message, booking_id, is_read, created_at");

        let rows = builder
            .build_query_as::<NotificationDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows)
    }

    #[instrument(skip(self), err)]
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<NotificationDBResponse>> {
        let rows = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            SELECT id, user_id, kind, title, message, booking_id, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }
}
