use crate::config::{self, CONFIG_FILENAME, CliOverrides, DEFAULT_DB_FILENAME, WORKSPACE_DIR};
use crate::error::{PokerError, Result};
use crate::secret::generate_secret_key;
use crate::storage::SqliteStorage;
use std::fs;
use std::path::Path;
use tracing::info;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created.
pub fn execute(force: bool, root_dir: Option<&Path>) -> Result<()> {
    let base_dir = root_dir.unwrap_or_else(|| Path::new("."));
    let poker_dir = base_dir.join(WORKSPACE_DIR);
    let db_path = poker_dir.join(DEFAULT_DB_FILENAME);

    if poker_dir.exists() {
        if db_path.exists() {
            if !force {
                return Err(PokerError::AlreadyInitialized { path: db_path });
            }
            for suffix in ["", "-wal", "-shm"] {
                let path = poker_dir.join(format!("{DEFAULT_DB_FILENAME}{suffix}"));
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
            info!(path = %db_path.display(), "Removed existing database");
        }
    } else {
        fs::create_dir(&poker_dir)?;
    }

    // An existing key is kept: rotating it would orphan stored passwords.
    let config_path = poker_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        let config = format!(
            r"# Poker Jira Configuration
# Key used to encrypt stored Jira passwords. Keep it secret.
secret-key: {key}
# To rotate, list the new key first and keep old ones until re-saved:
# field-encryption-keys:
#   - new-key
#   - {key}
# tracker:
#   connect-timeout: 5
#   read-timeout: 15
#   max-retries: 0
#   page-size: 50
# import:
#   max-results: 500
",
            key = generate_secret_key()
        );
        fs::write(&config_path, config)?;
    }

    let gitignore_path = poker_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let gitignore = r"# Database
*.db
*.db-shm
*.db-wal

# Contains the encryption key
config.yaml
";
        fs::write(gitignore_path, gitignore)?;
    }

    let layer = config::load_config(&poker_dir, &CliOverrides::default())?;
    let cipher = config::cipher_from_layer(&layer)?;
    SqliteStorage::open(&db_path, cipher)?;

    println!("Initialized poker workspace in {WORKSPACE_DIR}/");
    Ok(())
}
