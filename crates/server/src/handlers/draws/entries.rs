use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    draw, entry, now, sea_query::OnConflict, ActiveValue, ColumnTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QuerySelect, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::{Validate, ValidationErrors};

use crate::validation::ValidatedJson;

/// Errors that may occur during the entry import process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum EntryImportError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested draw was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "draw not found")]
    DrawNotFound,

    /// Entries can't be changed after the draw was locked.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "draw is no longer editable")]
    NotEditable,

    /// One of the provided entries is invalid.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid entry: {}", _0)]
    InvalidEntry(ValidationErrors),
}

/// Single imported comment or submission.
#[derive(Serialize, Deserialize, Validate)]
pub(super) struct EntryImport {
    #[validate(length(min = 1, max = 256))]
    external_id: String,

    #[validate(length(min = 1, max = 256))]
    author_id: String,

    #[validate(length(max = 256))]
    author_name: Option<String>,

    #[validate(length(max = 10000))]
    content: String,

    #[validate(url)]
    proof_url: Option<String>,

    /// Explicit correctness flag. Computed from the draw's correct answer if omitted.
    is_correct: Option<bool>,

    /// Marks entries rejected by the operator.
    #[serde(default)]
    ineligible: bool,
}

/// JSON request body.
#[derive(Deserialize, Validate)]
pub(super) struct EntryImportRequest {
    /// Up to 5000 entries per request.
    #[validate(length(min = 1, max = 5000))]
    entries: Vec<EntryImport>,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct EntryImportResponse {
    /// Amount of newly stored entries.
    imported: u64,

    /// Amount of entries that were already imported before.
    skipped: u64,

    /// Amount of newly stored entries from authors that already have an entry.
    duplicates: u64,
}

/// Entry import handler.
///
/// Entries are keyed by their external identifier, so repeating an import is safe.
/// Only the first entry of every author is eligible.
pub(super) async fn import(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<EntryImportRequest>,
) -> Result<Json<EntryImportResponse>, EntryImportError> {
    for entry in &request.entries {
        entry.validate()?;
    }

    db.transaction(|txn| {
        Box::pin(async move {
            let model = draw::Entity::find_by_id(id)
                .one(txn)
                .await?
                .ok_or(EntryImportError::DrawNotFound)?;

            if !model.is_editable() {
                return Err(EntryImportError::NotEditable);
            }

            let mut authors: HashSet<String> = entry::Entity::find()
                .select_only()
                .column(entry::Column::AuthorId)
                .filter(entry::Column::DrawId.eq(id))
                .filter(entry::Column::Status.eq(entry::Status::Eligible))
                .into_tuple::<String>()
                .all(txn)
                .await?
                .into_iter()
                .collect();

            let mut response = EntryImportResponse {
                imported: 0,
                skipped: 0,
                duplicates: 0,
            };

            for item in request.entries {
                let is_correct = item.is_correct.or_else(|| {
                    model
                        .correct_answer
                        .as_deref()
                        .map(|answer| model.answer_match.matches(answer, &item.content))
                });

                let status = if item.ineligible {
                    entry::Status::Ineligible
                } else if authors.contains(&item.author_id) {
                    entry::Status::Duplicate
                } else {
                    entry::Status::Eligible
                };

                let author_id = item.author_id.clone();

                let inserted = entry::Entity::insert(entry::ActiveModel {
                    draw_id: ActiveValue::Set(id),
                    external_id: ActiveValue::Set(item.external_id),
                    author_id: ActiveValue::Set(item.author_id),
                    author_name: ActiveValue::Set(item.author_name),
                    content: ActiveValue::Set(item.content),
                    status: ActiveValue::Set(status),
                    is_correct: ActiveValue::Set(is_correct),
                    proof_url: ActiveValue::Set(item.proof_url),
                    created_at: ActiveValue::Set(now()),
                    ..Default::default()
                })
                .on_conflict(
                    OnConflict::columns([entry::Column::DrawId, entry::Column::ExternalId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(txn)
                .await?;

                if inserted == 0 {
                    response.skipped += 1;
                    continue;
                }

                response.imported += 1;

                match status {
                    entry::Status::Eligible => {
                        authors.insert(author_id);
                    }
                    entry::Status::Duplicate => response.duplicates += 1,
                    entry::Status::Ineligible => {}
                }
            }

            info!(
                draw_id = %id,
                imported = response.imported,
                skipped = response.skipped,
                "entries imported"
            );

            Ok(Json(response))
        })
    })
    .await
    .into_raw_result()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::{
        draw, entry, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
        QueryOrder,
    };
    use serde_json::json;
    use tower::{Service, ServiceExt};

    use crate::testing::{
        create_database, insert_draw, operator_json, DrawSetup, ResponseBodyExt, TestApp,
    };

    async fn stored(db: &DatabaseConnection, draw_id: i64) -> Vec<entry::Model> {
        entry::Entity::find()
            .filter(entry::Column::DrawId.eq(draw_id))
            .order_by_asc(entry::Column::Id)
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn import() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        let mut service = TestApp::new(db.clone()).router;

        let body = json!({
            "entries": [
                { "external_id": "c1", "author_id": "a1", "content": "hello" },
                { "external_id": "c2", "author_id": "a2", "author_name": "Bob", "content": "hi" },
                { "external_id": "c3", "author_id": "a1", "content": "again" },
                { "external_id": "c4", "author_id": "a3", "content": "spam", "ineligible": true }
            ]
        });

        let response = service
            .call(operator_json(
                "POST",
                &format!("/draws/{}/entries", draw.id),
                &body,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.json().await,
            json!({ "imported": 4, "skipped": 0, "duplicates": 1 })
        );

        let statuses: Vec<entry::Status> = stored(&db, draw.id)
            .await
            .into_iter()
            .map(|entry| entry.status)
            .collect();

        assert_eq!(
            statuses,
            vec![
                entry::Status::Eligible,
                entry::Status::Eligible,
                entry::Status::Duplicate,
                entry::Status::Ineligible
            ]
        );

        let response = service
            .call(operator_json(
                "POST",
                &format!("/draws/{}/entries", draw.id),
                &body,
            ))
            .await
            .unwrap();

        assert_eq!(
            response.json().await,
            json!({ "imported": 0, "skipped": 4, "duplicates": 0 })
        );
        assert_eq!(stored(&db, draw.id).await.len(), 4);
    }

    #[tokio::test]
    async fn computed_correctness() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        draw::Entity::update(draw::ActiveModel {
            id: ActiveValue::Unchanged(draw.id),
            correct_answer: ActiveValue::Set(Some(String::from("Paris"))),
            answer_match: ActiveValue::Set(draw::AnswerMatch::Contains),
            ..Default::default()
        })
        .exec(&db)
        .await
        .unwrap();

        let response = TestApp::new(db.clone())
            .router
            .oneshot(operator_json(
                "POST",
                &format!("/draws/{}/entries", draw.id),
                json!({
                    "entries": [
                        { "external_id": "c1", "author_id": "a1", "content": "It's PARIS" },
                        { "external_id": "c2", "author_id": "a2", "content": "London" },
                        { "external_id": "c3", "author_id": "a3", "content": "Rome", "is_correct": true }
                    ]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let correctness: Vec<Option<bool>> = stored(&db, draw.id)
            .await
            .into_iter()
            .map(|entry| entry.is_correct)
            .collect();

        assert_eq!(correctness, vec![Some(true), Some(false), Some(true)]);
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

        let response = TestApp::new(db.clone())
            .router
            .oneshot(operator_json(
                "POST",
                &format!("/draws/{}/entries", draw.id),
                json!({
                    "entries": [{ "external_id": "c1", "author_id": "a1", "content": "late" }]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(stored(&db, draw.id).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_entry() {
        let db = create_database().await;
        let draw = insert_draw(&db, DrawSetup::default()).await;

        let response = TestApp::new(db)
            .router
            .oneshot(operator_json(
                "POST",
                &format!("/draws/{}/entries", draw.id),
                json!({
                    "entries": [{ "external_id": "", "author_id": "a1", "content": "hello" }]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
