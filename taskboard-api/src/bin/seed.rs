//! # Taskboard seed script
//!
//! Resets the database to a small demo data set.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p taskboard-api --bin taskboard-seed        # import
//! cargo run -p taskboard-api --bin taskboard-seed -- -d  # destroy
//! ```

use chrono::{Duration, Utc};
use sqlx::PgPool;
use taskboard_shared::{
    auth::password::hash_password,
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    models::{
        task::{NewTask, Task, TaskPriority, TaskStatus},
        user::{CreateUser, Role, User},
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SEED_PASSWORD: &str = "password123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

    let pool = create_pool(DatabaseConfig {
        url,
        max_connections: 2,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let destroy = std::env::args().skip(1).any(|arg| arg == "-d");
    let result = if destroy {
        destroy_data(&pool).await
    } else {
        import_data(&pool).await
    };

    close_pool(pool).await;
    result
}

async fn clear(pool: &PgPool) -> anyhow::Result<()> {
    let tasks = Task::delete_all(pool).await?;
    let users = User::delete_all(pool).await?;
    tracing::info!(tasks, users, "Existing data removed");
    Ok(())
}

async fn destroy_data(pool: &PgPool) -> anyhow::Result<()> {
    clear(pool).await?;
    tracing::info!("Data destroyed");
    Ok(())
}

async fn import_data(pool: &PgPool) -> anyhow::Result<()> {
    clear(pool).await?;

    let password_hash = hash_password(SEED_PASSWORD)?;
    let admin = User::create(
        pool,
        CreateUser {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: password_hash.clone(),
            role: Role::Admin,
        },
    )
    .await?;
    let user = User::create(
        pool,
        CreateUser {
            name: "User".to_string(),
            email: "user@example.com".to_string(),
            password_hash,
            role: Role::User,
        },
    )
    .await?;

    let now = Utc::now();
    let samples = [
        (
            "Build REST API",
            "Create a RESTful API for the task service",
            TaskStatus::InProgress,
            TaskPriority::High,
            now + Duration::days(7),
        ),
        (
            "Design UI Components",
            "Design reusable UI components for the frontend",
            TaskStatus::Pending,
            TaskPriority::Medium,
            now + Duration::days(14),
        ),
        (
            "Set up Authentication",
            "Implement JWT authentication on both frontend and backend",
            TaskStatus::Completed,
            TaskPriority::High,
            now - Duration::days(5),
        ),
    ];

    let count = samples.len();
    for (title, description, status, priority, due_date) in samples {
        Task::create(
            pool,
            NewTask {
                title: title.to_string(),
                description: description.to_string(),
                status,
                priority,
                due_date,
                assigned_to: user.id,
                created_by: admin.id,
                documents: Vec::new(),
            },
        )
        .await?;
    }

    tracing::info!(admin = %admin.email, user = %user.email, tasks = count, "Data imported");
    Ok(())
}
