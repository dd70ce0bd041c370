use std::sync::Arc;

use anyhow::Result;

use crate::nudge::{KeySender, Nudger};
use crate::tmux::TmuxClient;
use crate::verdict::{Action, Risk};

/// Manual nudge of a single pane, for recovering a pane by hand.
pub async fn run_nudge(target: &str, keys: &str, raw: bool) -> Result<()> {
    super::require_tmux()?;

    let sender: Arc<dyn KeySender> = Arc::new(TmuxClient::new());
    let nudger = Nudger::new(sender);

    let action = if raw {
        Action::raw_keys(keys, "manual nudge", Risk::Unspecified)
    } else {
        Action::cooked(keys, "manual nudge", Risk::Unspecified)
    };
    nudger.send_action(target, &action).await?;

    println!("sent {:?} to {}", keys, target);
    Ok(())
}
