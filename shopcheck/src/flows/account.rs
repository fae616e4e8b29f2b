use http::Method;
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

use super::FixtureScope;
use crate::assertions::{check_field, expect_document, expect_success, FieldMatch};
use crate::error::{HarnessError, Mismatch, Result};
use crate::resources::fixture_tag;
use crate::session::{log_in, Credentials, Session};

#[derive(Debug, Clone)]
pub struct UserAccountReport {
    pub user_id: String,
    pub email: String,
    pub edited_email: String,
}

/// Register a throwaway shopper, log in as them, edit the profile, delete the
/// account, and confirm the old credentials no longer log in.
pub async fn user_account_flow(anonymous: &Session, admin_email: &str) -> Result<UserAccountReport> {
    let mut scope = FixtureScope::new(anonymous);
    let outcome = user_account_steps(anonymous, admin_email, &mut scope).await;
    scope.finish(outcome).await
}

fn random_mobile() -> String {
    let mut rng = rand::thread_rng();
    format!("08{:08}", rng.gen_range(0..100_000_000u32))
}

async fn user_account_steps(
    anonymous: &Session,
    admin_email: &str,
    scope: &mut FixtureScope,
) -> Result<UserAccountReport> {
    let tag = fixture_tag();
    let email = format!("shopcheck.{}@example.com", tag);
    let password = format!("pw-{}", tag);

    let step = "register user";
    let resp = anonymous
        .request(
            Method::POST,
            "user/register",
            false,
            Some(&json!({
                "firstname": "Shop",
                "lastname": "Check",
                "email": email,
                "mobile": random_mobile(),
                "password": password,
            })),
        )
        .await?;
    expect_success(step, &resp)?;
    expect_document(step, &resp)?;

    let credentials = Credentials::new(&email, &password);
    let login = log_in(anonymous.client().as_ref(), &credentials, admin_email).await?;
    let user_id = login
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| Mismatch::new("log in registered user", "an _id", "missing").on_field("_id"))?;
    let user_path = format!("user/{}", user_id);
    scope.track_public(&user_path);
    info!(user = %user_id, "registered throwaway user");

    let step = "edit user";
    let edited_email = format!("shopcheck.edited.{}@example.com", tag);
    let first = json!("Stamat");
    let user = Session::with_token(anonymous.client().clone(), login.token);
    let resp = user
        .put(
            "user/edit-user",
            &json!({
                "firstname": first,
                "lastname": "Stamatov",
                "email": edited_email,
                "mobile": random_mobile(),
            }),
        )
        .await?;
    expect_success(step, &resp)?;
    let edited = expect_document(step, &resp)?;
    check_field(step, &edited, "firstname", &first, FieldMatch::Exact)?;

    let step = "delete user";
    let resp = anonymous.request(Method::DELETE, &user_path, false, None).await?;
    expect_success(step, &resp)?;
    scope.release(&user_path);

    let edited_credentials = Credentials::new(&edited_email, &password);
    match log_in(anonymous.client().as_ref(), &edited_credentials, admin_email).await {
        Err(HarnessError::Authentication { .. }) => {}
        Ok(_) => {
            return Err(Mismatch::new("log in deleted user", "authentication to fail", "a token").into());
        }
        Err(other) => return Err(other),
    }

    Ok(UserAccountReport {
        user_id,
        email,
        edited_email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockApiClient;
    use http::StatusCode;
    use std::sync::Arc;

    fn login_body(id: &str) -> Value {
        json!({ "_id": id, "firstname": "Shop", "token": "fresh-token" })
    }

    #[tokio::test]
    async fn account_lifecycle_uses_the_fresh_token() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(StatusCode::OK, &json!({ "_id": "u1" }));
        mock.enqueue_json(StatusCode::OK, &login_body("u1"));
        mock.enqueue_json(StatusCode::OK, &json!({ "_id": "u1", "firstname": "Stamat" }));
        mock.enqueue_json(StatusCode::OK, &json!({ "_id": "u1" }));
        mock.enqueue(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"Invalid Credentials"}"#);

        let anon = Session::anonymous(mock.clone());
        let report = user_account_flow(&anon, "admin@gmail.com").await.unwrap();

        assert_eq!(report.user_id, "u1");
        assert_ne!(report.email, report.edited_email);
        assert_eq!(
            mock.calls(),
            vec![
                "POST user/register",
                "POST user/login",
                "PUT user/edit-user",
                "DELETE user/u1",
                "POST user/login",
            ]
        );
        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].token, None);
        assert_eq!(requests[2].token.as_deref(), Some("fresh-token"));
        assert_eq!(requests[3].token, None);
    }

    #[tokio::test]
    async fn failed_edit_deletes_the_registered_user() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(StatusCode::OK, &json!({ "_id": "u2" }));
        mock.enqueue_json(StatusCode::OK, &login_body("u2"));
        mock.enqueue(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"boom"}"#);
        mock.enqueue_json(StatusCode::OK, &json!({}));

        let anon = Session::anonymous(mock.clone());
        let err = user_account_flow(&anon, "admin@gmail.com").await.unwrap_err();

        assert_eq!(err.mismatch().unwrap().step, "edit user");
        assert_eq!(mock.calls().last().unwrap(), "DELETE user/u2");
    }

    #[tokio::test]
    async fn deleted_user_that_still_logs_in_is_reported() {
        let mock = Arc::new(MockApiClient::default());
        mock.enqueue_json(StatusCode::OK, &json!({ "_id": "u3" }));
        mock.enqueue_json(StatusCode::OK, &login_body("u3"));
        mock.enqueue_json(StatusCode::OK, &json!({ "firstname": "Stamat" }));
        mock.enqueue_json(StatusCode::OK, &json!({}));
        mock.enqueue_json(StatusCode::OK, &login_body("u3"));

        let anon = Session::anonymous(mock.clone());
        let err = user_account_flow(&anon, "admin@gmail.com").await.unwrap_err();
        assert_eq!(err.mismatch().unwrap().step, "log in deleted user");
    }

    #[test]
    fn mobiles_are_ten_digits() {
        let m = random_mobile();
        assert_eq!(m.len(), 10);
        assert!(m.chars().all(|c| c.is_ascii_digit()));
    }
}
