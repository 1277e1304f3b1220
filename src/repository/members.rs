//! Member lookups

use async_trait::async_trait;

use super::{MemberStore, PgTransaction};
use crate::{
    error::{AppError, AppResult},
    models::Member,
};

#[async_trait]
impl MemberStore for PgTransaction {
    async fn find_member(&mut self, member_id: i64) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT id, name, email FROM members WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", member_id)))
    }
}
