use bson::doc;
use mongodb::{Client, Database};

pub mod profile;

/// Connects to the database named by `MONGODB_DATABASE` and pings it.
pub async fn connect_database() -> Database {
    let mongodb_uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let mongodb_database =
        std::env::var("MONGODB_DATABASE").expect("MONGODB_DATABASE must be set");

    let client = Client::with_uri_str(&mongodb_uri)
        .await
        .expect("Failed to connect to MongoDB");
    let database = client.database(&mongodb_database);
    database
        .run_command(doc! { "ping": 1 })
        .await
        .expect("MongoDB ping failed");

    log::info!("Connected to MongoDB database '{}'", mongodb_database);
    database
}
