use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, AnswerMatch, DrawMode, VideoFormat},
    sea_query::{Expr, SimpleExpr},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionErrorExt,
    TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::DrawData;
use crate::validation::ValidatedJson;

/// Errors that may occur during the draw update process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawUpdateError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Draw is locked or already moved past the draft status.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw is no longer editable")]
    NotEditable,
}

/// JSON request body.
///
/// Omitted fields are left unchanged.
#[derive(Deserialize, Validate)]
pub(super) struct DrawUpdateRequest {
    #[validate(length(min = 1, max = 200))]
    title: Option<String>,

    #[validate(range(min = 1, max = 1000))]
    winners_count: Option<i32>,

    #[validate(range(min = 0, max = 1000))]
    alternates_count: Option<i32>,

    draw_mode: Option<DrawMode>,

    answer_match: Option<AnswerMatch>,

    #[validate(length(min = 1, max = 500))]
    correct_answer: Option<String>,

    show_logo: Option<bool>,

    show_contest_image: Option<bool>,

    video_format: Option<VideoFormat>,
}

impl DrawUpdateRequest {
    fn into_columns(self) -> Vec<(draw::Column, SimpleExpr)> {
        let mut columns = Vec::new();

        if let Some(title) = self.title {
            columns.push((draw::Column::Title, Expr::value(title)));
        }

        if let Some(winners_count) = self.winners_count {
            columns.push((draw::Column::WinnersCount, Expr::value(winners_count)));
        }

        if let Some(alternates_count) = self.alternates_count {
            columns.push((draw::Column::AlternatesCount, Expr::value(alternates_count)));
        }

        if let Some(draw_mode) = self.draw_mode {
            columns.push((draw::Column::DrawMode, Expr::value(draw_mode)));
        }

        if let Some(answer_match) = self.answer_match {
            columns.push((draw::Column::AnswerMatch, Expr::value(answer_match)));
        }

        if let Some(correct_answer) = self.correct_answer {
            columns.push((draw::Column::CorrectAnswer, Expr::value(correct_answer)));
        }

        if let Some(show_logo) = self.show_logo {
            columns.push((draw::Column::ShowLogo, Expr::value(show_logo)));
        }

        if let Some(show_contest_image) = self.show_contest_image {
            columns.push((draw::Column::ShowContestImage, Expr::value(show_contest_image)));
        }

        if let Some(video_format) = self.video_format {
            columns.push((draw::Column::VideoFormat, Expr::value(video_format)));
        }

        columns
    }
}

/// Draw settings update handler.
///
/// Only editable draws (draft and not locked) can be updated.
pub(super) async fn update(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<DrawUpdateRequest>,
) -> Result<Json<DrawData>, DrawUpdateError> {
    db.transaction(|txn| {
        Box::pin(async move {
            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(DrawUpdateError::DrawNotFound)?;

            if !model.is_editable() {
                return Err(DrawUpdateError::NotEditable);
            }

            let columns = request.into_columns();

            if columns.is_empty() {
                return Ok(Json(model.into()));
            }

            let mut update = draw::Entity::update_many()
                .filter(draw::Column::Id.eq(id))
                .filter(draw::Column::Status.eq(draw::Status::Draft))
                .filter(draw::Column::LockedAt.is_null());

            for (column, value) in columns {
                update = update.col_expr(column, value);
            }

            if update.exec(txn).await?.rows_affected != 1 {
                return Err(DrawUpdateError::NotEditable);
            }

            info!(draw_id = %id, "draw updated");

            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(DrawUpdateError::DrawNotFound)?;

            Ok(Json(model.into()))
        })
    })
    .await
    .into_raw_result()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::testing::{
        create_database, insert_draw, operator_json, DrawSetup, ResponseBodyExt, TestApp,
    };

    #[tokio::test]
    async fn update() {
        let db = create_database().await;

        let draw = insert_draw(&db, DrawSetup::default()).await;

        let response = TestApp::new(db)
            .router
            .oneshot(operator_json(
                "PATCH",
                &format!("/draws/{}", draw.id),
                json!({
                    "title": "Winter giveaway",
                    "winners_count": 2,
                    "draw_mode": "RANDOM_CORRECT",
                    "correct_answer": "blue"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.json().await;
        assert_eq!(body["title"], "Winter giveaway");
        assert_eq!(body["winners_count"], 2);
        assert_eq!(body["alternates_count"], 0);
        assert_eq!(body["draw_mode"], "RANDOM_CORRECT");
        assert_eq!(body["correct_answer"], "blue");
    }

    #[tokio::test]
    async fn locked_draw() {
        let db = create_database().await;

        let draw = insert_draw(
            &db,
            DrawSetup {
                locked: true,
                ..Default::default()
            },
        )
        .await;

        let response = TestApp::new(db)
            .router
            .oneshot(operator_json(
                "PATCH",
                &format!("/draws/{}", draw.id),
                json!({ "winners_count": 5 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn empty_update() {
        let db = create_database().await;

        let draw = insert_draw(&db, DrawSetup::default()).await;

        let response = TestApp::new(db)
            .router
            .oneshot(operator_json(
                "PATCH",
                &format!("/draws/{}", draw.id),
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.json().await["title"], "Summer giveaway");
    }
}
