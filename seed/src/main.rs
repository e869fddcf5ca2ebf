//! Seed consumer: signs in through the session gate and writes a small bakery scenario.
//!
//! Run from repo root: `cargo run -p bakery-seed`
//! Uses the server's environment (`BAKERY_BACKEND`, `DATABASE_URL`, `JWT_SECRET`, ...). Sign-in
//! uses `SEED_TOKEN` when set, otherwise a short-lived token signed with `JWT_SECRET`.

use bakery_console::catalog::OrderSpec;
use bakery_console::model::{Recipe, UserRole};
use bakery_console::session::{Claims, SessionEvent};
use bakery_console::{
    apply_migrations, ensure_database_exists, BackendKind, Catalog, DataAccess, EntityKind, JwtIdentity, ListQuery,
    MemoryBackend, PgBackend, SessionGate, Settings, TableBackend,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn fields(v: Value) -> HashMap<String, Value> {
    match v {
        Value::Object(m) => m.into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn seed_token(settings: &Settings) -> Result<String, jsonwebtoken::errors::Error> {
    if let Ok(token) = std::env::var("SEED_TOKEN") {
        return Ok(token);
    }
    let claims = Claims {
        sub: "seed".into(),
        email: None,
        exp: chrono::Utc::now().timestamp() + 600,
        aud: settings.jwt_audience.clone(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bakery_console=info,bakery_seed=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = Arc::new(Catalog::bakery()?);
    let backend: Arc<dyn TableBackend> = match settings.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Postgres => {
            let database_url = settings.database_url.as_deref().unwrap_or_default();
            ensure_database_exists(database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(database_url)
                .await?;
            apply_migrations(&pool, &settings.schema, &catalog).await?;
            Arc::new(PgBackend::new(pool, settings.schema.clone()))
        }
    };

    let gate = SessionGate::new(Arc::new(JwtIdentity::hs256(
        settings.jwt_secret.as_bytes(),
        settings.jwt_audience.as_deref(),
    )));
    let _subscription = gate.on_session_change(|event| match event {
        SessionEvent::SignedIn(s) => tracing::info!(user = %s.user_id, "seed signed in"),
        SessionEvent::Refreshed(s) => tracing::info!(user = %s.user_id, "seed session refreshed"),
        SessionEvent::SignedOut => tracing::info!("seed signed out"),
    });
    let session = gate.sign_in(&seed_token(&settings)?)?;
    let data = DataAccess::new(backend, catalog, session);

    let kg = data
        .create(EntityKind::UnitOfMeasure, fields(json!({"name": "Kilogramo", "abbreviation": "kg"})))
        .await?;
    let flour = data
        .create(EntityKind::RawMaterial, fields(json!({"name": "Harina", "unit_id": kg["id"]})))
        .await?;
    let bread = data
        .create(EntityKind::Product, fields(json!({"name": "Pan de campo", "description": "Hogaza de masa madre"})))
        .await?;
    data.create(
        EntityKind::Recipe,
        fields(json!({
            "product_id": bread["id"],
            "raw_material_id": flour["id"],
            "required_quantity": 2.5,
            "unit_id": kg["id"]
        })),
    )
    .await?;
    for (qty, cost, date) in [(10.0, 25.0, "2024-05-01"), (30.0, 60.0, "2024-05-08")] {
        data.create(
            EntityKind::Purchase,
            fields(json!({
                "raw_material_id": flour["id"],
                "quantity": qty,
                "total_cost": cost,
                "purchase_date": date
            })),
        )
        .await?;
    }

    let ana = data
        .create(EntityKind::User, fields(json!({"user_name": "ana", "user_email": "ana@panaderia.test"})))
        .await?;
    data.create(EntityKind::Role, fields(json!({"rol_name": "Administrador", "rol_id_ext": "R-1"})))
        .await?;
    data.create(EntityKind::UserRole, fields(json!({"user_name": "ana", "rol_idext": "R-1"})))
        .await?;

    let recipes: Vec<Recipe> = data
        .list_as(&ListQuery::new().order_by(OrderSpec::asc("id")))
        .await?;
    for r in &recipes {
        let product = r.products.as_ref().and_then(|p| p.name.as_deref()).unwrap_or("-");
        let material = r.raw_materials.as_ref().and_then(|m| m.name.as_deref()).unwrap_or("-");
        println!("{} | {} | {}", product, material, r.quantity_label());
    }
    let flour_id = flour["id"].as_i64().unwrap_or_default();
    match data.ingredient_average_cost(flour_id).await? {
        Some(cost) => println!("Harina average cost: {:.4} per kg", cost),
        None => println!("Harina average cost: no purchases"),
    }
    let links: Vec<UserRole> = data
        .list_as(&ListQuery::new().filter("user_id", ana["user_id"].clone()))
        .await?;
    println!("ana has {} role(s)", links.len());

    gate.sign_out();
    Ok(())
}
