//! List command handler

use anyhow::Result;

use rollcall_core::{Config, Session};

use crate::output::Output;

/// Load the user list once and print it, optionally filtered by name
pub async fn run(config: &Config, search: Option<String>, output: &Output) -> Result<()> {
    let view = match Session::load_once(config).await {
        Ok(view) => view,
        Err(e) => {
            if let Some(hint) = e.recovery_suggestion() {
                eprintln!("{}", hint);
            }
            return Err(e.into());
        }
    };

    let query = search.unwrap_or_default();
    output.print_users(&view.search(&query), view.users.len());
    Ok(())
}
