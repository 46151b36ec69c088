use crate::domain::model::Identity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "elbek-storefront")]
#[command(about = "Storefront and owner console for a commissioned graphic design studio")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "storefront.toml", global = true)]
    pub config: String,

    #[arg(short, long, help = "Enable verbose output", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// 登入身分；未提供時退回 STOREFRONT_UID / STOREFRONT_EMAIL 環境變數
#[derive(Debug, Clone, Default, Args)]
pub struct IdentityArgs {
    #[arg(long, global = true)]
    pub uid: Option<String>,

    #[arg(long, global = true)]
    pub email: Option<String>,

    #[arg(long = "name", global = true)]
    pub display_name: Option<String>,
}

impl IdentityArgs {
    pub fn to_identity(&self) -> Option<Identity> {
        let uid = self.uid.clone()?;
        Some(Identity {
            uid,
            email: self.email.clone().unwrap_or_default(),
            display_name: self.display_name.clone(),
            photo_url: None,
        })
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show local shop time and whether orders are accepted
    Status,

    /// Price a set of services
    Quote {
        #[arg(long = "service", value_delimiter = ',', required = true)]
        services: Vec<String>,

        #[arg(long)]
        promo: Option<String>,

        #[arg(long)]
        no_promo: bool,
    },

    /// Public portfolio
    Portfolio,

    #[command(subcommand)]
    Order(OrderCommand),

    #[command(subcommand)]
    Notifications(NotificationCommand),

    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Debug, Clone, Subcommand)]
pub enum OrderCommand {
    /// Walk the order wizard with the given answers and submit
    Submit(SubmitArgs),

    /// List your own orders, newest first
    List,

    /// Cancel one of your orders that is still being checked
    Cancel {
        id: String,

        #[arg(long)]
        reason: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SubmitArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long, default_value = "male")]
    pub gender: String,

    #[arg(long)]
    pub phone: String,

    #[arg(long)]
    pub telegram: String,

    #[arg(long = "service", value_delimiter = ',', required = true)]
    pub services: Vec<String>,

    #[arg(long)]
    pub game: String,

    #[arg(long)]
    pub message: Option<String>,

    #[arg(long)]
    pub promo: Option<String>,

    #[arg(long)]
    pub no_promo: bool,

    /// Confirms the transfer to the studio card was made
    #[arg(long)]
    pub confirm_payment: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum NotificationCommand {
    List,

    Read { id: String },

    ReadAll,

    /// Keep listening and print the feed whenever it changes
    Watch {
        #[arg(long)]
        interval_seconds: Option<u64>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum AdminCommand {
    Orders,

    SetStatus { id: String, status: String },

    /// Set working hours, e.g. `hours 10:00 19:00` or `hours 22:00 02:00`
    Hours { start: String, end: String },

    Broadcast {
        #[arg(long)]
        title: String,

        #[arg(long)]
        message: String,

        /// Target user id; omit for a global broadcast
        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        attachment: Option<PathBuf>,

        #[arg(long)]
        link: Option<String>,
    },

    PortfolioAdd {
        #[arg(long)]
        title: String,

        #[arg(long)]
        file: PathBuf,
    },

    PortfolioRemove { id: String },

    Users,

    Block {
        uid: String,

        /// RFC 3339 time the block expires; omit for a permanent block
        #[arg(long)]
        until: Option<String>,
    },

    Unblock { uid: String },
}
