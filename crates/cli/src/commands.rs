//! CLI commands

use anyhow::Result;
use clap::Subcommand;
use opsdeck_client::{AdminApi, AuthApi, LoginOutcome, SessionCoordinator};
use opsdeck_core::FileTokenStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session tokens
    Login {
        /// Email address or phone number
        identifier: String,

        /// Password (prefer the environment variable over the flag)
        #[arg(long, env = "OPSDECK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Clear the stored session
    Logout,

    /// Show the signed-in user's profile
    Whoami,

    /// Manage console users
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users
    List {
        #[arg(long, default_value_t = 1000)]
        limit: u32,
    },

    /// Show one user
    Get { id: String },

    /// Delete users by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List categories
    List,

    /// Show one category
    Get { id: String },

    /// Delete categories by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl Commands {
    pub async fn execute(self, api_url: String, session_file: PathBuf) -> Result<()> {
        let store = Arc::new(FileTokenStore::new(session_file));
        let session = SessionCoordinator::builder()
            .base_url(api_url)
            .store(store)
            .on_session_expired(|| {
                info!("session expired, sign in again with `opsdeck login`");
            })
            .build()?;

        match self {
            Self::Login {
                identifier,
                password,
            } => {
                let auth = AuthApi::new(session);
                match auth.login(&identifier, &password).await? {
                    LoginOutcome::Authenticated { user } => {
                        let name = user
                            .and_then(|user| user.name)
                            .unwrap_or_else(|| identifier.clone());
                        println!("Signed in as {name}");
                    }
                    LoginOutcome::VerificationRequired(challenge) => {
                        println!(
                            "Account verification pending (method: {}); complete it in the console first",
                            challenge.method
                        );
                    }
                }
            }
            Self::Logout => {
                AuthApi::new(session).logout().await;
                println!("Signed out");
            }
            Self::Whoami => {
                let profile = AdminApi::new(session).profile().await?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
            Self::Users { command } => {
                let admin = AdminApi::new(session);
                match command {
                    UserCommands::List { limit } => {
                        let users = admin.list_users(limit).await?;
                        println!("{}", serde_json::to_string_pretty(&users)?);
                    }
                    UserCommands::Get { id } => {
                        let user = admin.get_user(&id).await?;
                        println!("{}", serde_json::to_string_pretty(&user)?);
                    }
                    UserCommands::Delete { ids } => {
                        admin.delete_users(&ids).await?;
                        println!("Deleted {} user(s)", ids.len());
                    }
                }
            }
            Self::Categories { command } => {
                let admin = AdminApi::new(session);
                match command {
                    CategoryCommands::List => {
                        let categories = admin.list_categories().await?;
                        println!("{}", serde_json::to_string_pretty(&categories)?);
                    }
                    CategoryCommands::Get { id } => {
                        let category = admin.get_category(&id).await?;
                        println!("{}", serde_json::to_string_pretty(&category)?);
                    }
                    CategoryCommands::Delete { ids } => {
                        admin.delete_categories(&ids).await?;
                        println!("Deleted {} categories", ids.len());
                    }
                }
            }
        }

        Ok(())
    }
}
