//! Shared test harness
//!
//! Builds an application over an in-memory database, seeds fixtures
//! through the query layer, and drives the HTTP surface by sending
//! requests straight into the router.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use patronage::db::{
    ExchangeQueries, ParticipantModel, ParticipantQueries, TipQueries, TransferQueries,
};
use patronage::money;
use patronage::payday::PaydayReport;
use patronage::{api, config::Config, App};

pub struct Harness {
    pub app: App,
}

impl Harness {
    pub async fn new() -> Self {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        Self::with_config(config).await
    }

    pub async fn with_config(mut config: Config) -> Self {
        config.database.url = "sqlite::memory:".to_string();
        let app = App::new(config).await.expect("build app");
        Self { app }
    }

    pub async fn make_participant(&self, username: &str) -> ParticipantModel {
        ParticipantQueries::new(&self.app.db)
            .create(username)
            .await
            .expect("create participant")
    }

    pub async fn make_exchange(&self, participant: &ParticipantModel, amount: &str, fee: &str) {
        ExchangeQueries::new(&self.app.db)
            .record(
                participant.id,
                money::parse_amount(amount).expect("parse amount"),
                money::parse_amount(fee).expect("parse fee"),
            )
            .await
            .expect("record exchange");
    }

    pub async fn set_tip(&self, tipper: &ParticipantModel, tippee: &ParticipantModel, amount: &str) {
        TipQueries::new(&self.app.db)
            .set(
                tipper.id,
                tippee.id,
                money::parse_amount(amount).expect("parse amount"),
            )
            .await
            .expect("set tip");
    }

    /// Insert a transfer outside of any settlement run, moving the
    /// balances by hand the way an administrative correction would.
    pub async fn out_of_band_transfer(
        &self,
        tipper: &ParticipantModel,
        tippee: &ParticipantModel,
        amount: &str,
    ) {
        let cents = money::parse_amount(amount).expect("parse amount");
        let participants = ParticipantQueries::new(&self.app.db);
        participants
            .adjust_balance(tipper.id, -cents)
            .await
            .expect("debit tipper");
        participants
            .adjust_balance(tippee.id, cents)
            .await
            .expect("credit tippee");
        TransferQueries::new(&self.app.db)
            .record(tipper.id, tippee.id, cents, "tip")
            .await
            .expect("record transfer");
    }

    pub async fn run_payday(&self) -> PaydayReport {
        self.app.payday.run().await.expect("payday run")
    }

    pub async fn balance_of(&self, username: &str) -> i64 {
        ParticipantQueries::new(&self.app.db)
            .get_by_username(username)
            .await
            .expect("lookup participant")
            .expect("participant exists")
            .balance
    }

    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get_as(&self, path: &str, user: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .header("x-forwarded-user", user)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        user: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-forwarded-user", user);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let router = api::router(self.app.clone());
        let response = router.oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse body")
        };
        (status, body)
    }
}

/// Today's date the way the chart feeds render run dates
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
