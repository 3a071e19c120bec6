use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use sqlx::PgPool;

use opsdesk::modules::principals::service::PrincipalService;
use opsdesk_cli::seeder::{self, SeedConfig, StaffCounts};
use opsdesk_core::{AppError, hash_password};
use opsdesk_models::{Email, NewPrincipal, PrincipalStatus, Role};

#[derive(Parser)]
#[command(name = "opsdesk-cli")]
#[command(about = "OpsDesk CLI - Administrative tools for OpsDesk", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new administrator account
    CreateAdmin {
        /// Display name
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Email address
        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Password (will be prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Link an external identity to an existing principal
    LinkIdentity {
        /// Email of the principal to link
        #[arg(short = 'e', long)]
        email: String,

        /// Identity provider, e.g. `google`
        #[arg(long)]
        provider: String,

        /// Subject identifier issued by the provider
        #[arg(long)]
        subject: String,
    },
    /// Seed the database with fake staff, customers and vendors
    Seed {
        /// Number of managers
        #[arg(long, default_value = "3")]
        managers: usize,

        /// Number of employees
        #[arg(long, default_value = "10")]
        employees: usize,

        /// Number of customers
        #[arg(short = 'c', long, default_value = "200")]
        customers: usize,

        /// Number of vendors
        #[arg(short = 'v', long, default_value = "50")]
        vendors: usize,
    },
    /// Clear all seeded data (keeps admins)
    Clear,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let pool = match opsdesk_db::init_db_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    };

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::CreateAdmin {
            name,
            email,
            password,
        } => handle_create_admin(&pool, name, email, password).await,
        Commands::LinkIdentity {
            email,
            provider,
            subject,
        } => handle_link_identity(&pool, &email, &provider, &subject).await,
        Commands::Seed {
            managers,
            employees,
            customers,
            vendors,
        } => {
            let config = SeedConfig::new(customers, vendors)
                .with_staff(StaffCounts { managers, employees });
            seeder::seed_all(&pool, config).await
        }
        Commands::Clear => seeder::clear_all(&pool).await,
    };

    if let Err(e) = result {
        eprintln!("\n❌ {}", e);
        std::process::exit(1);
    }
}

/// Field errors when there are any, else the caller-facing message.
fn describe(err: &AppError) -> String {
    match err.field_errors() {
        Some(errors) => errors.to_string(),
        None => err.public_message(),
    }
}

fn prompt(label: &str) -> Result<String, Box<dyn std::error::Error>> {
    Ok(Input::new().with_prompt(label).interact_text()?)
}

async fn handle_create_admin(
    pool: &PgPool,
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = match name {
        Some(name) => name,
        None => prompt("Name")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt("Email address")?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    };
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".into());
    }

    let email = Email::new(&email)?;
    let password_hash =
        hash_password(&password).map_err(|e| format!("Failed to hash password: {}", e.error))?;

    let admin = PrincipalService::create(
        pool,
        NewPrincipal {
            name: name.trim().to_string(),
            email,
            password_hash: Some(password_hash),
            role: Role::Admin,
            status: PrincipalStatus::Active,
            external_identity: None,
        },
    )
    .await
    .map_err(|e| format!("Error creating admin: {}", describe(&e)))?;

    println!("\n✅ Admin created successfully!");
    println!("   Email: {}", admin.email);
    println!("   Name: {}", admin.name);
    Ok(())
}

async fn handle_link_identity(
    pool: &PgPool,
    email: &str,
    provider: &str,
    subject: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::new(email)?;
    let principal = PrincipalService::find_by_email(pool, &email)
        .await
        .map_err(|e| e.error)?
        .ok_or_else(|| format!("No principal with email {}", email))?;

    let holder = PrincipalService::find_by_external_identity(pool, provider, subject)
        .await
        .map_err(|e| e.error)?;
    match holder {
        Some(holder) if holder.id == principal.id => {
            println!("ℹ️  {} identity is already linked to {}", provider, principal.email);
            return Ok(());
        }
        Some(holder) => {
            return Err(format!(
                "The {} identity is already linked to {} ({})",
                provider, holder.email, holder.id
            )
            .into());
        }
        None => {}
    }

    PrincipalService::link_identity(pool, principal.id, provider, subject)
        .await
        .map_err(|e| format!("Error linking identity: {}", describe(&e)))?;

    println!("✅ Linked {} identity to {}", provider, principal.email);
    Ok(())
}
