use http::StatusCode;
use serde_json::Value;
use tracing::{info, warn};

use crate::assertions::{
    absent_body, check_field, check_fresh_timestamps, check_touched_timestamps, expect_array,
    expect_document, expect_identity, expect_status, expect_success, listing_contains,
    parse_instant, Absence, FieldMatch,
};
use crate::client::ApiResponse;
use crate::error::{Mismatch, Result};
use crate::resources::ResourceSpec;
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct LifecycleResult {
    pub created_id: String,
    pub create_response: Value,
    pub update_response: Option<Value>,
    pub delete_confirmed: bool,
    pub absence: Absence,
}

/// Create, read back, optionally list, update, delete, verify absence.
///
/// A create that yields no identity ends the run with that failure. Once an
/// identity is known, any later failure (including the checks on the create
/// response itself) first deletes the fixture, best effort, and then reports.
pub async fn run_lifecycle(spec: &ResourceSpec, session: &Session) -> Result<LifecycleResult> {
    let (created_id, create_response) = create(spec, session).await?;
    info!(resource = spec.name, id = %created_id, "created");

    if let Err(e) = check_created(spec, &create_response) {
        teardown(spec, session, &created_id).await;
        return Err(e.into());
    }

    let mut deleted = false;
    let outcome = drive(spec, session, &created_id, &create_response, &mut deleted).await;

    match outcome {
        Ok((update_response, absence)) => Ok(LifecycleResult {
            created_id,
            create_response,
            update_response: Some(update_response),
            delete_confirmed: deleted,
            absence,
        }),
        Err(e) => {
            if !deleted {
                teardown(spec, session, &created_id).await;
            }
            Err(e)
        }
    }
}

async fn drive(
    spec: &ResourceSpec,
    session: &Session,
    id: &str,
    created: &Value,
    deleted: &mut bool,
) -> Result<(Value, Absence)> {
    read_back(spec, session, id).await?;

    if spec.list_after_create {
        expect_listed(spec, session, id).await?;
    }

    let updated = update(spec, session, id, created).await?;
    info!(resource = spec.name, id, "updated");

    let step = format!("delete {}", spec.name);
    let resp = session.delete(&spec.item_path(id)).await?;
    expect_success(&step, &resp)?;
    *deleted = true;
    info!(resource = spec.name, id, "deleted");

    let absence = verify_absent(spec, session, id).await?;
    let again = verify_absent(spec, session, id).await?;
    if absence != again {
        return Err(Mismatch::new(
            format!("re-verify deleted {}", spec.name),
            format!("{:?}", absence),
            format!("{:?}", again),
        )
        .into());
    }
    info!(resource = spec.name, id, ?absence, "verified absent");

    Ok((updated, absence))
}

async fn create(spec: &ResourceSpec, session: &Session) -> Result<(String, Value)> {
    let step = format!("create {}", spec.name);
    let resp = session.post(&spec.collection_path, &spec.create_body).await?;
    expect_status(&step, &resp, StatusCode::OK)?;

    let doc = expect_document(&step, &resp)?;
    let id = expect_identity(&step, &doc, &spec.identity_field)?;
    Ok((id, doc))
}

fn check_created(spec: &ResourceSpec, doc: &Value) -> std::result::Result<(), Mismatch> {
    let step = format!("create {}", spec.name);
    for required in &spec.required_on_create {
        let sent = spec.create_body.get(&required.name).unwrap_or(&Value::Null);
        check_field(&step, doc, &required.name, sent, required.rule)?;
    }
    if spec.timestamps {
        check_fresh_timestamps(&step, doc)?;
    }
    Ok(())
}

async fn read(spec: &ResourceSpec, session: &Session, path: &str) -> Result<ApiResponse> {
    if spec.read_requires_auth {
        session.get_authed(path).await
    } else {
        session.get(path).await
    }
}

async fn read_back(spec: &ResourceSpec, session: &Session, id: &str) -> Result<()> {
    let step = format!("read {}", spec.name);
    let resp = read(spec, session, &spec.item_path(id)).await?;
    expect_success(&step, &resp)?;
    let doc = expect_document(&step, &resp)?;
    let read_id = expect_identity(&step, &doc, &spec.identity_field)?;
    if read_id != id {
        return Err(Mismatch::new(step, format!("\"{}\"", id), format!("\"{}\"", read_id))
            .on_field(&spec.identity_field)
            .into());
    }
    Ok(())
}

async fn fetch_listing(spec: &ResourceSpec, session: &Session, step: &str) -> Result<Vec<Value>> {
    let resp = read(spec, session, &spec.collection_path).await?;
    expect_status(step, &resp, StatusCode::OK)?;
    let doc = expect_document(step, &resp)?;
    Ok(expect_array(step, &doc)?.clone())
}

async fn expect_listed(spec: &ResourceSpec, session: &Session, id: &str) -> Result<()> {
    let step = format!("list {}", spec.name);
    let listing = fetch_listing(spec, session, &step).await?;
    if listing_contains(&listing, &spec.identity_field, id) {
        Ok(())
    } else {
        Err(Mismatch::new(step, format!("listing to contain {}", id), "no such entry").into())
    }
}

async fn update(spec: &ResourceSpec, session: &Session, id: &str, created: &Value) -> Result<Value> {
    let step = format!("update {}", spec.name);
    let resp = session.put(&spec.item_path(id), &spec.update_body).await?;
    expect_status(&step, &resp, StatusCode::OK)?;

    let doc = expect_document(&step, &resp)?;
    let updated_id = expect_identity(&step, &doc, &spec.identity_field)?;
    if updated_id != id {
        return Err(Mismatch::new(&step, format!("\"{}\" (unchanged)", id), format!("\"{}\"", updated_id))
            .on_field(&spec.identity_field)
            .into());
    }

    for checked in &spec.checked_on_update {
        let sent = spec.update_body.get(&checked.name).unwrap_or(&Value::Null);
        check_field(&step, &doc, &checked.name, sent, checked.rule)?;
    }
    for kept in &spec.kept_on_update {
        let original = created.get(kept).unwrap_or(&Value::Null);
        check_field(&step, &doc, kept, original, FieldMatch::Exact)?;
    }
    if spec.timestamps {
        check_touched_timestamps(&step, &doc)?;
    }

    Ok(doc)
}

/// Proof of deletion: the item read is empty or `null`, or the collection no
/// longer lists the identity.
pub async fn verify_absent(spec: &ResourceSpec, session: &Session, id: &str) -> Result<Absence> {
    let step = format!("verify {} deleted", spec.name);
    let resp = read(spec, session, &spec.item_path(id)).await?;
    if let Some(absence) = absent_body(&resp.body) {
        return Ok(absence);
    }

    let listing = fetch_listing(spec, session, &step).await?;
    if listing_contains(&listing, &spec.identity_field, id) {
        Err(Mismatch::new(
            step,
            "an empty body, null, or no listing entry",
            crate::error::truncate(&resp.body),
        )
        .into())
    } else {
        Ok(Absence::MissingFromListing)
    }
}

/// Checks the collection's shape: every entry has an identity and the
/// descriptor's listing fields. Returns the number of entries.
pub async fn check_listing(spec: &ResourceSpec, session: &Session) -> Result<usize> {
    let step = format!("list {}", spec.name);
    let listing = fetch_listing(spec, session, &step).await?;

    for item in &listing {
        expect_identity(&step, item, &spec.identity_field)?;
        for field in &spec.listing_fields {
            check_field(&step, item, field, &Value::Null, FieldMatch::NonEmpty)?;
        }
        for field in &spec.listing_dates {
            let raw = item.get(field).and_then(Value::as_str).unwrap_or_default();
            if parse_instant(raw).is_none() {
                return Err(Mismatch::new(&step, "a valid date-time", format!("\"{}\"", raw))
                    .on_field(field)
                    .into());
            }
        }
    }

    Ok(listing.len())
}

async fn teardown(spec: &ResourceSpec, session: &Session, id: &str) {
    match session.delete(&spec.item_path(id)).await {
        Ok(resp) if resp.is_success() => info!(resource = spec.name, id, "fixture removed after failure"),
        Ok(resp) => warn!(resource = spec.name, id, status = resp.status.as_u16(), "fixture teardown refused"),
        Err(e) => warn!(resource = spec.name, id, error = %e, "fixture teardown failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockApiClient;
    use crate::error::HarnessError;
    use crate::resources;
    use serde_json::json;
    use std::sync::Arc;

    const TS: &str = "2025-03-01T10:00:00.000Z";
    const TS_LATER: &str = "2025-03-01T10:00:01.000Z";

    fn session(mock: &Arc<MockApiClient>) -> Session {
        Session::with_token(mock.clone(), "admin-token")
    }

    fn script_color_success(mock: &MockApiClient, spec: &ResourceSpec) {
        let title = spec.create_body["title"].clone();
        let new_title = spec.update_body["title"].clone();
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "c1", "title": title, "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "c1", "title": title}));
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "c1", "title": new_title, "createdAt": TS, "updatedAt": TS_LATER}),
        );
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "c1"}));
        mock.enqueue(StatusCode::OK, "null");
        mock.enqueue(StatusCode::OK, "null");
    }

    #[tokio::test]
    async fn color_lifecycle_runs_every_step_in_order() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::color("t1");
        script_color_success(&mock, &spec);

        let result = run_lifecycle(&spec, &session(&mock)).await.unwrap();

        assert_eq!(result.created_id, "c1");
        assert!(result.delete_confirmed);
        assert_eq!(result.absence, Absence::NullLiteral);
        assert_eq!(result.update_response.unwrap()["title"], "Updated Color t1");
        assert_eq!(
            mock.calls(),
            vec![
                "POST color",
                "GET color/c1",
                "PUT color/c1",
                "DELETE color/c1",
                "GET color/c1",
                "GET color/c1",
            ]
        );
    }

    #[tokio::test]
    async fn failed_create_skips_remaining_steps() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"duplicate"}"#);

        let err = run_lifecycle(&resources::brand("t1"), &session(&mock)).await.unwrap_err();

        let mismatch = err.mismatch().expect("assertion failure");
        assert_eq!(mismatch.step, "create brand");
        assert!(mismatch.actual.contains("duplicate"));
        assert_eq!(mock.calls(), vec!["POST brand"]);
    }

    #[tokio::test]
    async fn missing_required_field_reports_mismatch_and_cleans_up() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "b1", "createdAt": TS, "updatedAt": TS}));
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "b1"}));

        let err = run_lifecycle(&resources::brand("t1"), &session(&mock)).await.unwrap_err();

        let mismatch = err.mismatch().expect("assertion failure");
        assert_eq!(mismatch.field.as_deref(), Some("title"));
        assert_eq!(mismatch.actual, "missing");
        assert_eq!(mock.calls(), vec!["POST brand", "DELETE brand/b1"]);
    }

    #[tokio::test]
    async fn wrong_field_on_create_still_deletes_the_fixture() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "b1", "title": "WRONG", "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue(StatusCode::OK, "{}");

        let err = run_lifecycle(&resources::brand("t1"), &session(&mock)).await.unwrap_err();

        assert_eq!(err.mismatch().unwrap().step, "create brand");
        assert_eq!(mock.calls(), vec!["POST brand", "DELETE brand/b1"]);
    }

    #[tokio::test]
    async fn update_failure_deletes_the_fixture() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::color("t2");
        let title = spec.create_body["title"].clone();
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "c9", "title": title, "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "c9", "title": title}));
        mock.enqueue(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"boom"}"#);
        mock.enqueue(StatusCode::OK, "{}");

        let err = run_lifecycle(&spec, &session(&mock)).await.unwrap_err();

        assert_eq!(err.mismatch().unwrap().step, "update color");
        assert_eq!(
            mock.calls(),
            vec!["POST color", "GET color/c9", "PUT color/c9", "DELETE color/c9"]
        );
    }

    #[tokio::test]
    async fn stale_timestamps_after_update_fail() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::color("t3");
        let title = spec.create_body["title"].clone();
        let new_title = spec.update_body["title"].clone();
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "c2", "title": title, "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "c2"}));
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "c2", "title": new_title, "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue(StatusCode::OK, "null");

        let err = run_lifecycle(&spec, &session(&mock)).await.unwrap_err();
        assert_eq!(err.mismatch().unwrap().field.as_deref(), Some("updatedAt"));
    }

    #[tokio::test]
    async fn changed_identity_on_update_is_rejected() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::brand("t4");
        let title = spec.create_body["title"].clone();
        mock.enqueue_json(
            StatusCode::OK,
            &json!({"_id": "b1", "title": title, "createdAt": TS, "updatedAt": TS}),
        );
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "b1"}));
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "b2", "title": spec.update_body["title"]}));
        mock.enqueue(StatusCode::OK, "null");

        let err = run_lifecycle(&spec, &session(&mock)).await.unwrap_err();
        let mismatch = err.mismatch().unwrap();
        assert_eq!(mismatch.field.as_deref(), Some("_id"));
        assert_eq!(mismatch.actual, "\"b2\"");
    }

    #[tokio::test]
    async fn absence_accepts_missing_listing_entry() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::category("t5");
        mock.enqueue(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"not found"}"#);
        mock.enqueue_json(StatusCode::OK, &json!([{"_id": "other", "title": "x"}]));

        let absence = verify_absent(&spec, &session(&mock), "gone").await.unwrap();
        assert_eq!(absence, Absence::MissingFromListing);
    }

    #[tokio::test]
    async fn absence_fails_when_entry_still_listed() {
        let mock = Arc::new(MockApiClient::default());
        let spec = resources::category("t6");
        mock.enqueue_json(StatusCode::OK, &json!({"_id": "still", "title": "here"}));
        mock.enqueue_json(StatusCode::OK, &json!([{"_id": "still", "title": "here"}]));

        let err = verify_absent(&spec, &session(&mock), "still").await.unwrap_err();
        assert!(err.mismatch().unwrap().step.starts_with("verify category"));
    }

    #[tokio::test]
    async fn empty_body_counts_as_absent() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue(StatusCode::OK, "");
        let absence = verify_absent(&resources::blog("t"), &session(&mock), "x").await.unwrap();
        assert_eq!(absence, Absence::EmptyBody);
    }

    #[tokio::test]
    async fn coupon_reads_send_the_token() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue(StatusCode::OK, "null");
        verify_absent(&resources::coupon("t"), &session(&mock), "x").await.unwrap();
        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].token.as_deref(), Some("admin-token"));
    }

    #[tokio::test]
    async fn listing_check_requires_identity_and_fields() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(
            StatusCode::OK,
            &json!([
                {"_id": "1", "name": "SUMMER21", "expiry": "2030-01-01T00:00:00.000Z"},
                {"_id": "2", "name": "", "expiry": "2030-01-01T00:00:00.000Z"}
            ]),
        );
        let err = check_listing(&resources::coupon("t"), &session(&mock)).await.unwrap_err();
        assert_eq!(err.mismatch().unwrap().field.as_deref(), Some("name"));

        mock.enqueue_json(
            StatusCode::OK,
            &json!([{"_id": "1", "name": "SUMMER21", "expiry": "2030-01-01T00:00:00.000Z"}]),
        );
        let count = check_listing(&resources::coupon("t"), &session(&mock)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn lifecycle_without_token_never_reaches_the_backend() {
        let mock = Arc::new(MockApiClient::default());
        let anonymous = Session::anonymous(mock.clone());
        let err = run_lifecycle(&resources::color("t"), &anonymous).await.unwrap_err();
        assert!(matches!(err, HarnessError::MissingToken));
        assert!(mock.calls().is_empty());
    }
}
