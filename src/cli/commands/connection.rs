//! Connection command implementation.
//!
//! Provides Jira connection management: add, edit, list, show, delete, and
//! test. `add` and `edit` can verify the connection before saving.

use crate::cli::{ConnectionAddArgs, ConnectionCommands, ConnectionEditArgs, ConnectionTestArgs};
use crate::cli::commands::{open_workspace, print_json};
use crate::config::{CliOverrides, Workspace};
use crate::error::{PokerError, Result};
use crate::model::{ConnectionRecord, ConnectionUpdate, NewConnection};
use crate::resolver::{ConnectionResolver, Overrides};
use crate::storage::SqliteStorage;
use crate::tracker::JiraClientFactory;
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Execute the connection command.
///
/// # Errors
///
/// Returns an error if database operations fail, inputs are invalid, or a
/// requested connection test fails.
pub fn execute(command: &ConnectionCommands, json: bool, cli: &CliOverrides) -> Result<()> {
    let (mut storage, workspace) = open_workspace(cli)?;

    match command {
        ConnectionCommands::Add(args) => connection_add(args, &mut storage, &workspace, json),
        ConnectionCommands::Edit(args) => connection_edit(args, &mut storage, &workspace, json),
        ConnectionCommands::List => connection_list(&storage, json),
        ConnectionCommands::Show { id } => connection_show(*id, &storage, json),
        ConnectionCommands::Delete { id } => connection_delete(*id, &mut storage, json),
        ConnectionCommands::Test(args) => connection_test(args, &storage, &workspace, json),
    }
}

/// JSON/human view of a connection. The password itself is never shown.
#[derive(Serialize)]
struct ConnectionView<'a> {
    #[serde(flatten)]
    record: &'a ConnectionRecord,
    display_name: &'a str,
    has_password: bool,
}

impl<'a> From<&'a ConnectionRecord> for ConnectionView<'a> {
    fn from(record: &'a ConnectionRecord) -> Self {
        Self {
            record,
            display_name: record.display_name(),
            has_password: record.has_password(),
        }
    }
}

fn verify_before_save(record: &ConnectionRecord, workspace: &Workspace) -> Result<()> {
    let factory = JiraClientFactory::new(workspace.tracker);
    let resolver = ConnectionResolver::new(&factory, record, &Overrides::default());
    resolver.verify()?;
    info!(connection = %record.display_name(), "Connection verified before save");
    Ok(())
}

fn connection_add(
    args: &ConnectionAddArgs,
    storage: &mut SqliteStorage,
    workspace: &Workspace,
    json: bool,
) -> Result<()> {
    let new = NewConnection {
        label: args.label.clone(),
        api_url: args.api_url.clone(),
        username: args.username.clone(),
        password: args.password.clone(),
        story_points_field: args.story_points_field.clone(),
    };
    if args.test {
        verify_before_save(&new.preview(), workspace)?;
    }

    let created = storage.create_connection(&new)?;
    if json {
        print_json(&ConnectionView::from(&created))?;
    } else {
        println!("Added connection {}: {}", created.id, created.display_name());
    }
    Ok(())
}

/// Translate edit flags into an update. Empty label/username clear the field.
pub(crate) fn build_update(args: &ConnectionEditArgs) -> Result<ConnectionUpdate> {
    if args.delete_password && args.password.is_some() {
        return Err(PokerError::validation(
            "password",
            "cannot set a new password and delete the stored one at the same time",
        ));
    }

    let clearable = |value: &Option<String>| {
        value
            .as_ref()
            .map(|v| Some(v.clone()).filter(|v| !v.is_empty()))
    };
    let password = if args.delete_password {
        Some(None)
    } else {
        args.password
            .as_ref()
            .filter(|p| !p.is_empty())
            .map(|p| Some(p.clone()))
    };

    Ok(ConnectionUpdate {
        label: clearable(&args.label),
        api_url: args.api_url.clone(),
        username: clearable(&args.username),
        password,
        story_points_field: args.story_points_field.clone(),
    })
}

fn connection_edit(
    args: &ConnectionEditArgs,
    storage: &mut SqliteStorage,
    workspace: &Workspace,
    json: bool,
) -> Result<()> {
    let update = build_update(args)?;
    let current = storage.require_connection(args.id)?;

    if args.test {
        verify_before_save(&current.with_update(&update), workspace)?;
    }

    let updated = if update.is_empty() {
        current
    } else {
        storage.update_connection(args.id, &update)?
    };

    if json {
        print_json(&ConnectionView::from(&updated))?;
    } else {
        println!("Updated connection {}: {}", updated.id, updated.display_name());
    }
    Ok(())
}

fn connection_list(storage: &SqliteStorage, json: bool) -> Result<()> {
    let connections = storage.list_connections()?;
    if json {
        let views: Vec<ConnectionView<'_>> = connections.iter().map(Into::into).collect();
        return print_json(&views);
    }

    if connections.is_empty() {
        println!("No connections.");
        return Ok(());
    }
    for connection in &connections {
        println!(
            "{:>4}  {}  ({})",
            connection.id,
            connection.display_name(),
            connection.api_url
        );
    }
    Ok(())
}

fn connection_show(id: i64, storage: &SqliteStorage, json: bool) -> Result<()> {
    let connection = storage.require_connection(id)?;
    if json {
        return print_json(&ConnectionView::from(&connection));
    }

    println!("ID:                 {}", connection.id);
    println!("Label:              {}", connection.label.as_deref().unwrap_or("-"));
    println!("API URL:            {}", connection.api_url);
    println!(
        "Username:           {}",
        connection.username.as_deref().unwrap_or("-")
    );
    println!(
        "Password:           {}",
        if connection.has_password() { "set" } else { "not set" }
    );
    println!("Story points field: {}", connection.story_points_field);
    Ok(())
}

fn connection_delete(id: i64, storage: &mut SqliteStorage, json: bool) -> Result<()> {
    storage.delete_connection(id)?;
    if json {
        print_json(&json!({ "status": "deleted", "id": id }))?;
    } else {
        println!("Deleted connection {id}");
    }
    Ok(())
}

fn connection_test(
    args: &ConnectionTestArgs,
    storage: &SqliteStorage,
    workspace: &Workspace,
    json: bool,
) -> Result<()> {
    let record = storage.require_connection(args.id)?;
    let overrides = Overrides {
        username: args.credentials.username.clone(),
        password: args.credentials.password.clone(),
        api_url: args.api_url.clone(),
    };

    let factory = JiraClientFactory::new(workspace.tracker);
    let resolver = ConnectionResolver::new(&factory, &record, &overrides);
    resolver.verify()?;

    if json {
        print_json(&json!({
            "status": "ok",
            "connection": record.display_name(),
            "api_url": resolver.connection().api_url,
        }))?;
    } else {
        println!("Connection to \"{}\" succeeded.", record.display_name());
    }
    Ok(())
}
