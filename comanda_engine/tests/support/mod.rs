#![allow(dead_code)]

use comanda_engine::{
    db_types::{LedgerAudit, Money, NewOrderItem, Role},
    events::EventProducers,
    test_utils::{
        fake_gateway::FakeGateway,
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_product, seed_user},
    },
    traits::{LoyaltyManagement, OrderFlowDatabase},
    AccountApi,
    LoyaltyApi,
    OrderFlowApi,
    OrderFlowConfig,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub type Api = OrderFlowApi<SqliteDatabase, FakeGateway>;

/// A fresh database with a small menu and a few users.
pub struct Fixture {
    pub api: Api,
    pub customer: i64,
    pub other_customer: i64,
    pub staff: i64,
    pub admin: i64,
    /// 85.00
    pub tacos: i64,
    /// 22.50
    pub horchata: i64,
    /// Not available
    pub pozole: i64,
}

pub async fn setup() -> Fixture {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> Fixture {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let customer = seed_user(&db, "Ana Torres", Role::Customer).await;
    let other_customer = seed_user(&db, "Luis Vega", Role::Customer).await;
    let staff = seed_user(&db, "Cocina", Role::Staff).await;
    let admin = seed_user(&db, "Gerencia", Role::Admin).await;
    let tacos = seed_product(&db, "Tacos al pastor", Money::from(8_500), true).await;
    let horchata = seed_product(&db, "Horchata", Money::from(2_250), true).await;
    let pozole = seed_product(&db, "Pozole", Money::from(12_000), false).await;
    let api = OrderFlowApi::new(db, FakeGateway::new(), producers, OrderFlowConfig::default());
    Fixture { api, customer, other_customer, staff, admin, tacos, horchata, pozole }
}

impl Fixture {
    pub fn db(&self) -> &SqliteDatabase {
        self.api.db()
    }

    pub fn gateway(&self) -> &FakeGateway {
        self.api.gateway()
    }

    pub fn accounts(&self) -> AccountApi<SqliteDatabase> {
        AccountApi::new(self.db().clone())
    }

    pub fn loyalty(&self) -> LoyaltyApi<SqliteDatabase> {
        LoyaltyApi::new(self.db().clone())
    }

    /// Two plates of tacos: 170.00
    pub fn two_tacos(&self) -> Vec<NewOrderItem> {
        vec![NewOrderItem::new(self.tacos, 2).with_notes("sin cebolla")]
    }

    pub async fn balance(&self, user_id: i64) -> i64 {
        self.audit(user_id).await.balance
    }

    pub async fn audit(&self, user_id: i64) -> LedgerAudit {
        self.db().audit_ledger(user_id).await.expect("Error auditing ledger").expect("User does not exist")
    }

    pub async fn tear_down(self) {
        let mut db = self.api.db().clone();
        let url = db.url().to_string();
        if let Err(e) = db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Failed to drop database {url}: {e}");
        }
    }
}
