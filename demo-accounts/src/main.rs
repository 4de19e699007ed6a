use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account_store::{AccountError, Preferences, User};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!("account_store=debug,{}=debug,info", env!("CARGO_CRATE_NAME")).into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let accounts = account_store::init().await?;

    let email = "a@b.com";
    let user = User::new("A".to_string(), email.to_string(), String::new());

    let added = accounts.add_user(&user).await?;
    tracing::info!(added, "add_user");

    match accounts.add_user(&user).await {
        Err(AccountError::DuplicateEntity(msg)) => {
            tracing::info!(%msg, "Second add_user rejected as expected");
        }
        other => tracing::warn!(?other, "Second add_user was not rejected"),
    }

    let token = uuid::Uuid::new_v4().to_string();
    let inserted = accounts.insert_user_session(email, &token).await?;
    let refreshed = accounts
        .create_user_session(email, &uuid::Uuid::new_v4().to_string())
        .await?;
    tracing::info!(inserted, refreshed, "Session stored");

    let mut preferences = Preferences::new();
    preferences.insert("favorite_genre".to_string(), json!("noir"));
    let updated = accounts
        .update_user_preferences(email, Some(&preferences))
        .await?;
    tracing::info!(updated, "Preferences replaced");

    if let Some(stored) = accounts.get_user(email).await? {
        tracing::info!(email = %stored.email, preferences = ?stored.preferences, "Stored user");
    }

    let deleted = accounts.delete_user(email).await?;
    let remaining = accounts.get_user(email).await?;
    tracing::info!(deleted, remaining = remaining.is_some(), "delete_user");

    Ok(())
}
