//! Command-line surface.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::api::types::{AssetFilters, AssetStatus, AssetUpdate, AuditFilters};
use crate::commands::{self, parse_status};
use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::state::AppState;
use crate::upload::{Observer, UploadMetadata, UploadStatus, UploadTask};

#[derive(Parser, Debug)]
#[command(name = "assetdesk", version, about = "Digital asset management from the terminal")]
pub struct Args {
    /// API base URL (overrides ASSETDESK_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store credentials
    Login {
        username: String,
        /// Prompted on stdin when omitted
        #[arg(long, env = "ASSETDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget stored credentials
    Logout,
    /// Show the signed-in user and their permissions
    Whoami,
    /// Browse and edit assets
    #[command(subcommand)]
    Assets(AssetCommand),
    /// Upload files directly to storage
    Upload(UploadArgs),
    /// Manage folders
    #[command(subcommand)]
    Folders(FolderCommand),
    /// Manage tags
    #[command(subcommand)]
    Tags(TagCommand),
    /// Browse the audit log
    Audit {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        target_type: Option<String>,
        #[arg(long)]
        actor: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AssetCommand {
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        folder: Option<String>,
        /// Media type filter, e.g. image or video
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<AssetStatus>,
        /// List soft-deleted assets instead
        #[arg(long)]
        deleted: bool,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        alt_text: Option<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<AssetStatus>,
        /// Move into this folder
        #[arg(long, conflicts_with = "root")]
        folder: Option<String>,
        /// Move to the root folder
        #[arg(long)]
        root: bool,
        /// Replace tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Delete {
        id: String,
    },
    Restore {
        id: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[arg(long)]
    pub folder: Option<String>,
    /// Tag id to attach (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<AssetStatus>,
    #[arg(long)]
    pub alt_text: Option<String>,
    #[arg(long)]
    pub caption: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum FolderCommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    List,
    Create { name: String },
    Rename { id: String, name: String },
    Delete { id: String },
}

/// Execute one parsed command line.
pub async fn run(args: Args, mut config: Config) -> Result<()> {
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    let state = AppState::new(&config, Some(progress_printer()));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(&state, args.command, &mut out).await
}

async fn dispatch(state: &AppState, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            commands::login(state, &username, &password, out).await
        }
        Command::Logout => commands::logout(state, out).await,
        Command::Whoami => commands::whoami(state, out).await,
        Command::Assets(cmd) => dispatch_assets(state, cmd, out).await,
        Command::Upload(args) => {
            let metadata = UploadMetadata {
                folder: args.folder,
                tag_ids: args.tags,
                status: args.status,
                alt_text: args.alt_text,
                caption: args.caption,
            };
            commands::upload(state, &args.files, &metadata, out).await
        }
        Command::Folders(cmd) => match cmd {
            FolderCommand::List => commands::list_folders(state, out).await,
            FolderCommand::Create { name, parent } => {
                commands::create_folder(state, &name, parent.as_deref(), out).await
            }
            FolderCommand::Rename { id, name } => commands::rename_folder(state, &id, &name, out).await,
            FolderCommand::Delete { id } => commands::delete_folder(state, &id, out).await,
        },
        Command::Tags(cmd) => match cmd {
            TagCommand::List => commands::list_tags(state, out).await,
            TagCommand::Create { name } => commands::create_tag(state, &name, out).await,
            TagCommand::Rename { id, name } => commands::rename_tag(state, &id, &name, out).await,
            TagCommand::Delete { id } => commands::delete_tag(state, &id, out).await,
        },
        Command::Audit {
            page,
            action,
            target_type,
            actor,
        } => {
            let filters = AuditFilters {
                page,
                action,
                target_type,
                actor,
                ..Default::default()
            };
            commands::audit(state, &filters, out).await
        }
    }
}

async fn dispatch_assets(state: &AppState, command: AssetCommand, out: &mut impl Write) -> Result<()> {
    match command {
        AssetCommand::List {
            page,
            search,
            tag,
            folder,
            kind,
            status,
            deleted,
        } => {
            let filters = AssetFilters {
                page,
                search,
                tag,
                folder,
                kind,
                status,
                deleted: deleted.then_some(true),
                ..Default::default()
            };
            commands::list_assets(state, &filters, out).await
        }
        AssetCommand::Show { id } => commands::show_asset(state, &id, out).await,
        AssetCommand::Update {
            id,
            alt_text,
            caption,
            status,
            folder,
            root,
            tags,
        } => {
            let update = AssetUpdate {
                alt_text,
                caption,
                status,
                folder: if root { Some(None) } else { folder.map(Some) },
                tag_ids: (!tags.is_empty()).then_some(tags),
            };
            commands::update_asset(state, &id, &update, out).await
        }
        AssetCommand::Delete { id } => commands::delete_asset(state, &id, out).await,
        AssetCommand::Restore { id } => commands::restore_asset(state, &id, out).await,
    }
}

fn prompt_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(ValidationError::new("password", "Password is required").into());
    }
    Ok(password)
}

/// Print a line per status change and every 10% of transfer progress.
fn progress_printer() -> Observer {
    Arc::new(|task: &UploadTask| match task.status {
        UploadStatus::Uploading if task.progress % 10 != 0 => {}
        UploadStatus::Error => eprintln!(
            "{}: error: {}",
            task.filename,
            task.error.as_deref().unwrap_or("unknown")
        ),
        status => eprintln!("{}: {} {}%", task.filename, status.as_str(), task.progress),
    })
}
