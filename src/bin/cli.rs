use clap::{Parser, Subcommand};
use findtutor::{
    db,
    models::Role,
    repositories::{user_repository::SqliteUserRepository, UserFilter},
    services::user_service::{CreateUserRequest, UpdatePasswordRequest, UserService},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "findtutor-cli")]
#[command(about = "CLI tool for managing Find Your Tutor accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user (the only way to create admins)
    Create {
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// student, tutor or admin
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Phone number, required for students and tutors
        #[arg(long)]
        phone: Option<String>,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List users
    List {
        /// Only users with this role
        #[arg(short, long)]
        role: Option<String>,

        /// Substring of username or email
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user and everything they own
    Delete {
        /// Email address of the user to delete
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

async fn get_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

async fn confirm_password(prompt: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let password = get_password(prompt).await?;
    let confirm = get_password("Confirm password").await?;
    Ok((password, confirm))
}

fn parse_role(raw: &str) -> Role {
    match raw.parse::<Role>() {
        Ok(role) => role,
        Err(err) => {
            eprintln!("❌ {}", err);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let user_service = Arc::new(UserService::new(user_repository));

    // Parse CLI arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                username,
                email,
                role,
                phone,
                password,
            } => {
                let role = parse_role(&role);
                if role.has_profile() && phone.is_none() {
                    eprintln!("❌ --phone is required for {} accounts", role);
                    std::process::exit(1);
                }

                let (password, password_confirm) = if let Some(pw) = password {
                    (pw.clone(), pw)
                } else {
                    confirm_password("Password").await?
                };

                let request = CreateUserRequest {
                    username,
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                    role,
                    phone,
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Username: {}", user.username);
                        println!("  Email: {}", user.email);
                        println!("  Role: {}", user.role);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to create user: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            UserCommands::List {
                role,
                search,
                limit,
                offset,
            } => {
                let filter = UserFilter {
                    search,
                    role: role.as_deref().map(parse_role),
                    limit: Some(limit),
                    offset: Some(offset),
                };

                match user_service.list_users(&filter).await {
                    Ok(users) => {
                        if users.is_empty() {
                            println!("No users found.");
                        } else {
                            println!(
                                "{:<5} {:<20} {:<35} {:<8} {:<20}",
                                "ID", "Username", "Email", "Role", "Created"
                            );
                            println!("{}", "-".repeat(92));
                            for user in users {
                                println!(
                                    "{:<5} {:<20} {:<35} {:<8} {:<20}",
                                    user.id,
                                    user.username,
                                    user.email,
                                    user.role,
                                    user.created_at.as_deref().unwrap_or("N/A")
                                );
                            }
                        }
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to list users: {}", err);
                        std::process::exit(1);
                    }
                }
            }

            UserCommands::Delete { email } => match user_service.find_user_by_email(&email).await {
                Ok(Some(user)) => match user_service.delete_user(user.id).await {
                    Ok(()) => {
                        println!("✅ User '{}' deleted successfully!", email);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to delete user: {}", err);
                        std::process::exit(1);
                    }
                },
                Ok(None) => {
                    eprintln!("❌ User '{}' not found", email);
                    std::process::exit(1);
                }
                Err(err) => {
                    eprintln!("❌ Failed to find user: {}", err);
                    std::process::exit(1);
                }
            },

            UserCommands::SetPassword { email, password } => {
                match user_service.find_user_by_email(&email).await {
                    Ok(Some(user)) => {
                        let (new_password, password_confirm) = if let Some(pw) = password {
                            (pw.clone(), pw)
                        } else {
                            confirm_password("New password").await?
                        };

                        let request = UpdatePasswordRequest {
                            user_id: user.id,
                            new_password,
                            new_password_confirm: Some(password_confirm),
                        };

                        match user_service.update_password(request).await {
                            Ok(()) => {
                                println!("✅ Password updated successfully for '{}'!", email);
                            }
                            Err(err) => {
                                eprintln!("❌ Failed to update password: {}", err);
                                std::process::exit(1);
                            }
                        }
                    }
                    Ok(None) => {
                        eprintln!("❌ User '{}' not found", email);
                        std::process::exit(1);
                    }
                    Err(err) => {
                        eprintln!("❌ Failed to find user: {}", err);
                        std::process::exit(1);
                    }
                }
            }
        },
    }

    Ok(())
}
