//! Back-office commands.
//!
//! Record payloads are given as JSON with `--json`, either inline or as
//! `@path/to/file.json`. For `update` the JSON only needs the fields that
//! change; it is merged over the stored record.
//!
//! # Usage
//!
//! ```bash
//! amicale admin posts create --json '{"title":"AG","content":"Le 12 juin","published":true}' --image a.jpg --image b.jpg
//! amicale admin events update 3f0c... --json '{"location":"Salle des fêtes"}'
//! amicale admin users role 8d1e... editor
//! amicale admin gallery upload repas.jpg danse.jpg --caption "Repas des anciens"
//! amicale admin schema events
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use amicale_admin::console::{AdminConsole, CollectionConsole, ImageUpload};
use amicale_admin::models::{Event, LotteryConfig, Post, Product, Profile, Representative};
use amicale_core::records::{Editable, Record};
use amicale_core::schema::FieldSpec;
use amicale_core::{GalleryImageId, OrderId, OrderStatus, ProfileRole, UserId};
use amicale_storefront::state::AppState;
use clap::{ArgAction, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// News posts
    Posts {
        #[command(subcommand)]
        action: RecordCommand,
    },
    /// Calendar events
    Events {
        #[command(subcommand)]
        action: RecordCommand,
    },
    /// Board members
    Representatives {
        #[command(subcommand)]
        action: RecordCommand,
    },
    /// Merchandise catalog
    Products {
        #[command(subcommand)]
        action: RecordCommand,
    },
    /// Lottery configuration
    Lottery {
        #[command(subcommand)]
        action: LotteryCommand,
    },
    /// Merchandise orders
    Orders {
        #[command(subcommand)]
        action: OrdersCommand,
    },
    /// Members
    Users {
        #[command(subcommand)]
        action: UsersCommand,
    },
    /// Photo gallery
    Gallery {
        #[command(subcommand)]
        action: GalleryCommand,
    },
    /// Print the form fields of a collection
    Schema { collection: String },
}

#[derive(Subcommand)]
pub enum RecordCommand {
    /// List records
    List,
    /// Create a record
    Create {
        /// Record fields as JSON (or @file)
        #[arg(long)]
        json: String,
        /// Image files to attach
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Change a record
    Update {
        id: String,
        /// Fields to change as JSON (or @file)
        #[arg(long)]
        json: String,
        /// Image files to attach
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Delete a record
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum LotteryCommand {
    /// Show the lottery
    Show,
    /// Create or change the lottery
    Save {
        /// Fields to set as JSON (or @file)
        #[arg(long)]
        json: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum OrdersCommand {
    /// List orders, newest first
    List,
    /// Change the status of an order
    Status { order_id: OrderId, status: OrderStatus },
}

#[derive(Subcommand)]
pub enum UsersCommand {
    /// List members
    List,
    /// Change a member's role
    Role { user_id: UserId, role: ProfileRole },
    /// Activate or deactivate a member
    Active {
        user_id: UserId,
        #[arg(action = ArgAction::Set)]
        active: bool,
    },
    /// Delete a member and their account
    Delete { user_id: UserId },
}

#[derive(Subcommand)]
pub enum GalleryCommand {
    /// List photos
    List,
    /// Upload photos
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Delete a photo
    Delete { id: GalleryImageId },
}

pub async fn run(state: &AppState, command: AdminCommand, assume_yes: bool) -> Result<(), CliError> {
    let console = AdminConsole::new(Arc::clone(state.store()), state.gate().clone());
    let confirm = |prompt: &str| output::confirm(prompt, assume_yes);

    match command {
        AdminCommand::Posts { action } => run_records(console.posts()?, action, &confirm).await,
        AdminCommand::Events { action } => run_records(console.events()?, action, &confirm).await,
        AdminCommand::Representatives { action } => {
            run_records(console.representatives()?, action, &confirm).await
        }
        AdminCommand::Products { action } => {
            run_records(console.products()?, action, &confirm).await
        }
        AdminCommand::Lottery { action } => {
            let mut lottery = console.lottery()?;
            let current = lottery.load().await?.cloned();
            match action {
                LotteryCommand::Show => match current {
                    Some(config) => output::json(&config)?,
                    None => output::line("No lottery configured"),
                },
                LotteryCommand::Save { json, image } => {
                    merge_into(lottery.draft_mut(), &read_json(&json)?)?;
                    let image = image.as_deref().map(ImageUpload::from_path).transpose()?;
                    let saved = lottery.save(image).await?;
                    output::json(&saved)?;
                }
            }
            Ok(())
        }
        AdminCommand::Orders { action } => {
            let mut orders = console.orders()?;
            match action {
                OrdersCommand::List => {
                    for details in orders.load().await? {
                        output::line(format_args!(
                            "{}  {}  {:<9}  {}  {}  {} line(s)",
                            details.order.id,
                            details.order.created_at.format("%Y-%m-%d %H:%M"),
                            details.order.status,
                            details.order.total_amount,
                            details.customer.as_deref().unwrap_or("?"),
                            details.items.len()
                        ));
                    }
                }
                OrdersCommand::Status { order_id, status } => {
                    let order = orders.set_status(order_id, status).await?;
                    output::line(format_args!("Order {} is now {}", order.id, order.status));
                }
            }
            Ok(())
        }
        AdminCommand::Users { action } => {
            let mut users = console.users()?;
            users.load().await?;
            match action {
                UsersCommand::List => {
                    for profile in users.users() {
                        output::line(format_args!(
                            "{}  {:<10}  {:<8}  {}",
                            profile.id,
                            profile.role,
                            if profile.active { "active" } else { "inactive" },
                            profile.display_name()
                        ));
                    }
                }
                UsersCommand::Role { user_id, role } => users.set_role(user_id, role).await?,
                UsersCommand::Active { user_id, active } => users.set_active(user_id, active).await?,
                UsersCommand::Delete { user_id } => users.delete(user_id, &confirm).await?,
            }
            if let Some(notice) = users.notice() {
                output::line(notice);
            }
            Ok(())
        }
        AdminCommand::Gallery { action } => {
            let mut gallery = console.gallery()?;
            gallery.load().await?;
            match action {
                GalleryCommand::List => {
                    for image in gallery.images() {
                        output::line(format_args!(
                            "{}  {}  {}",
                            image.id,
                            image.image_url,
                            image.caption.as_deref().unwrap_or("")
                        ));
                    }
                }
                GalleryCommand::Upload { files, caption } => {
                    let files = read_images(&files)?;
                    let batch = gallery.upload(files, caption.as_deref()).await?;
                    for (file, error) in &batch.failed {
                        output::error(format_args!("{}: {error}", file.file_name));
                    }
                    output::line(batch.summary("uploaded"));
                }
                GalleryCommand::Delete { id } => {
                    gallery.delete(id, &confirm).await?;
                    output::line("Photo deleted");
                }
            }
            Ok(())
        }
        AdminCommand::Schema { collection } => output::json(&schema_of(&collection)?),
    }
}

async fn run_records<R>(
    mut console: CollectionConsole<R>,
    command: RecordCommand,
    confirm: &impl Fn(&str) -> bool,
) -> Result<(), CliError>
where
    R: Editable,
{
    match command {
        RecordCommand::List => {
            let items = console.load().await?;
            output::json(&items)?;
        }
        RecordCommand::Create { json, images } => {
            *console.create_buffer_mut() = serde_json::from_value(read_json(&json)?)?;
            let outcome = console.submit(read_images(&images)?).await?;
            report_uploads(&outcome.uploads.failed);
            output::json(&outcome.record)?;
        }
        RecordCommand::Update { id, json, images } => {
            console.load().await?;
            let id = find_id(&console, &id)?;
            merge_into(console.begin_edit(id)?, &read_json(&json)?)?;
            let outcome = console.submit(read_images(&images)?).await?;
            report_uploads(&outcome.uploads.failed);
            output::json(&outcome.record)?;
        }
        RecordCommand::Delete { id } => {
            console.load().await?;
            let id = find_id(&console, &id)?;
            console.delete(id, confirm).await?;
            output::line("Deleted");
        }
    }
    Ok(())
}

fn find_id<R: Editable>(console: &CollectionConsole<R>, raw: &str) -> Result<R::Id, CliError> {
    console
        .items()
        .iter()
        .map(Record::id)
        .find(|id| id.to_string() == raw.trim())
        .ok_or_else(|| CliError::Usage(format!("no record {raw} in {}", R::COLLECTION)))
}

fn report_uploads<E: std::fmt::Display>(failed: &[(ImageUpload, E)]) {
    for (file, error) in failed {
        output::error(format_args!("{}: {error}", file.file_name));
    }
}

/// Inline JSON, or the content of a file when prefixed with `@`.
fn read_json(raw: &str) -> Result<Value, CliError> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => raw.to_owned(),
    };
    Ok(serde_json::from_str(&text)?)
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<ImageUpload>, CliError> {
    paths
        .iter()
        .map(|p| ImageUpload::from_path(p.as_path()).map_err(CliError::from))
        .collect()
}

/// Overwrite the fields of `draft` present in `changes`.
fn merge_into<D: Serialize + DeserializeOwned>(draft: &mut D, changes: &Value) -> Result<(), CliError> {
    let mut current = serde_json::to_value(&*draft)?;
    match (&mut current, changes) {
        (Value::Object(target), Value::Object(changes)) => {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => return Err(CliError::Usage("--json must be a JSON object".to_owned())),
    }
    *draft = serde_json::from_value(current)?;
    Ok(())
}

fn schema_of(collection: &str) -> Result<&'static [FieldSpec], CliError> {
    let schema = match collection.trim() {
        "posts" => Post::SCHEMA,
        "events" => Event::SCHEMA,
        "lottery" | "lottery_config" => LotteryConfig::SCHEMA,
        "users" | "profiles" => Profile::SCHEMA,
        "representatives" => Representative::SCHEMA,
        "products" | "merchandise" => Product::SCHEMA,
        other => return Err(CliError::Usage(format!("no form for {other}"))),
    };
    Ok(schema)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_admin::models::EventDraft;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_merge_into_overwrites_given_fields() {
        let mut draft = EventDraft {
            title: "Brocante".to_owned(),
            location: Some("Mairie".to_owned()),
            ..EventDraft::default()
        };
        merge_into(&mut draft, &json!({ "location": "Salle des fêtes" })).unwrap();
        assert_eq!(draft.title, "Brocante");
        assert_eq!(draft.location.as_deref(), Some("Salle des fêtes"));
    }

    #[test]
    fn test_merge_into_rejects_non_object() {
        let mut draft = EventDraft::default();
        assert!(matches!(
            merge_into(&mut draft, &json!(["a"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_read_json_inline_and_file() {
        assert_eq!(read_json(r#"{"a":1}"#).unwrap(), json!({ "a": 1 }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"title":"Loto"}"#).unwrap();
        let value = read_json(&format!("@{}", path.display())).unwrap();
        assert_eq!(value["title"], "Loto");
    }

    #[test]
    fn test_schema_lookup() {
        assert!(schema_of("events").unwrap().iter().any(|f| f.name == "starts_at"));
        assert!(schema_of("settings").is_err());
    }
}
