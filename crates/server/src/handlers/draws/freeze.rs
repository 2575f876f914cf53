use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw::{self, generate_draw_code},
    lifecycle::{self, Event, IllegalTransition},
    sea_query::Expr,
    source_binding, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, SelectExt, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use tracing::info;

use super::{transition_update, DrawData};

/// Errors that may occur while freezing a draw.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DrawFreezeError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Draw can only be frozen from the draft status.
    #[status(StatusCode::CONFLICT)]
    IllegalTransition(IllegalTransition),

    /// Entry collection must be locked before freezing.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw must be locked before freezing")]
    NotLocked,

    /// Draw must be bound to a post before freezing.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw must be bound to a post before freezing")]
    MissingSource,

    /// Draw status was changed by a concurrent request.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw was modified concurrently")]
    ConcurrentModification,
}

/// Freeze the draw inputs, assigning the fairness code.
pub(super) async fn freeze(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DrawData>, DrawFreezeError> {
    db.transaction(|txn| {
        Box::pin(async move {
            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(DrawFreezeError::DrawNotFound)?;

            lifecycle::transition(model.status, Event::Freeze)?;

            if model.locked_at.is_none() {
                return Err(DrawFreezeError::NotLocked);
            }

            let has_source = source_binding::Entity::find_by_id(id)
                .select_only()
                .exists(txn)
                .await?;

            if !has_source {
                return Err(DrawFreezeError::MissingSource);
            }

            let draw_code = model.draw_code.clone().unwrap_or_else(generate_draw_code);

            let result = transition_update(&model, Event::Freeze)?
                .col_expr(draw::Column::DrawCode, Expr::value(draw_code.clone()))
                .filter(draw::Column::LockedAt.is_not_null())
                .exec(txn)
                .await?;

            if result.rows_affected != 1 {
                return Err(DrawFreezeError::ConcurrentModification);
            }

            info!(draw_id = %id, %draw_code, "draw frozen");

            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(DrawFreezeError::DrawNotFound)?;

            Ok(Json(model.into()))
        })
    })
    .await
    .into_raw_result()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::{draw, DatabaseConnection, EntityTrait};
    use tower::ServiceExt;

    use crate::testing::{
        bind_source, create_database, insert_draw, operator_request, DrawSetup, ResponseBodyExt,
        TestApp,
    };

    async fn status(db: &DatabaseConnection, id: i64) -> draw::Status {
        draw::Entity::find_by_id(id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn freeze() {
        let db = create_database().await;
        let draw = insert_draw(
            &db,
            DrawSetup {
                locked: true,
                ..Default::default()
            },
        )
        .await;
        bind_source(&db, draw.id).await;

        let response = TestApp::new(db.clone())
            .router
            .oneshot(operator_request(
                "POST",
                &format!("/draws/{}/freeze", draw.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.json().await;
        assert_eq!(body["status"], "FROZEN");

        let code = body["draw_code"].as_str().unwrap();
        assert_eq!(code.len(), 9);
        assert_eq!(&code[4..5], "-");

        assert_eq!(status(&db, draw.id).await, draw::Status::Frozen);
    }

    #[tokio::test]
    async fn not_locked() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;
        bind_source(&db, draw.id).await;

        let response = TestApp::new(db.clone())
            .router
            .oneshot(operator_request(
                "POST",
                &format!("/draws/{}/freeze", draw.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(status(&db, draw.id).await, draw::Status::Draft);
    }

    #[tokio::test]
    async fn missing_source() {
        let db = create_database().await;
        let draw = insert_draw(
            &db,
            DrawSetup {
                locked: true,
                ..Default::default()
            },
        )
        .await;

        let response = TestApp::new(db.clone())
            .router
            .oneshot(operator_request(
                "POST",
                &format!("/draws/{}/freeze", draw.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.json().await["error"],
            "draw must be bound to a post before freezing"
        );
        assert_eq!(status(&db, draw.id).await, draw::Status::Draft);
    }

    #[tokio::test]
    async fn already_frozen() {
        let db = create_database().await;
        let draw = insert_draw(
            &db,
            DrawSetup {
                status: draw::Status::Frozen,
                locked: true,
                ..Default::default()
            },
        )
        .await;
        bind_source(&db, draw.id).await;

        let response = TestApp::new(db)
            .router
            .oneshot(operator_request(
                "POST",
                &format!("/draws/{}/freeze", draw.id),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
