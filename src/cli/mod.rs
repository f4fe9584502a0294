use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod account;
pub mod articles;
pub mod chat;

use crate::backend::{Collection, SortField, SortOrder};
use crate::chat::{ContextMode, WireFormat};
use crate::core::{AppConfig, logging};

#[derive(Subcommand)]
enum Command {
    /// Sign in and print an access token for HNCHAT_TOKEN
    Login {
        #[arg(long)]
        email: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
    },
    /// List articles with their AI summaries
    Articles {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        size: u32,
        #[arg(long, value_enum)]
        sort_by: Option<SortField>,
        #[arg(long, value_enum)]
        order: Option<SortOrder>,
        /// Only list your favorites
        #[arg(long, action, default_value = "false", conflicts_with = "read_later")]
        favorites: bool,
        /// Only list your read-later bookmarks
        #[arg(long, action, default_value = "false")]
        read_later: bool,
    },
    /// Show one article with its full AI analysis
    Article {
        id: i64,
    },
    /// Add an article to your favorites
    Favorite {
        id: i64,
        #[arg(long, action, default_value = "false")]
        remove: bool,
    },
    /// Bookmark an article to read later
    ReadLater {
        id: i64,
        #[arg(long, action, default_value = "false")]
        remove: bool,
    },
    /// Start a chat session, globally or about one article
    Chat {
        #[arg(long)]
        article: Option<i64>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Backend origin, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token, overrides HNCHAT_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,

    #[arg(long, global = true, value_enum)]
    wire_format: Option<WireFormat>,

    #[arg(long, global = true, value_enum)]
    context: Option<ContextMode>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        if let Some(api_url) = &self.api_url {
            config.api_url = api_url.trim_end_matches('/').to_string();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(wire_format) = self.wire_format {
            config.wire_format = wire_format;
        }
        if let Some(context) = self.context {
            config.context_mode = context;
        }
        config
    }
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    logging::init();
    let config = args.config();
    tracing::debug!("Using backend at {}", config.api_url);

    // Handle each sub command
    match args.command {
        Some(Command::Login { email }) => {
            account::login(&config, &email).await?;
        }
        Some(Command::Signup { email }) => {
            account::signup(&config, &email).await?;
        }
        Some(Command::Articles {
            page,
            size,
            sort_by,
            order,
            favorites,
            read_later,
        }) => {
            let collection = if favorites {
                Some(Collection::Favorites)
            } else if read_later {
                Some(Collection::ReadLater)
            } else {
                None
            };
            articles::list(&config, page, size, sort_by, order, collection).await?;
        }
        Some(Command::Article { id }) => {
            articles::show(&config, id).await?;
        }
        Some(Command::Favorite { id, remove }) => {
            articles::toggle(&config, Collection::Favorites, id, !remove).await?;
        }
        Some(Command::ReadLater { id, remove }) => {
            articles::toggle(&config, Collection::ReadLater, id, !remove).await?;
        }
        Some(Command::Chat { article }) => {
            chat::run(config, article).await?;
        }
        None => {}
    }

    Ok(())
}
