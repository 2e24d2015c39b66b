//! Chat Actions
//!
//! A chat reply from the model may ask the agent to do something with its
//! wallet. The possible actions are a closed set; anything else in the
//! model's output is a parse error.

use serde::{Deserialize, Serialize};

use city_registry::{Transfer, Wallet};

use crate::error::ChatError;
use crate::llm::strip_code_fence;

/// Something the agent does in response to a chat message
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    /// Send tokens from the agent's wallet
    Transfer { to: String, amount: u64 },
    /// Report the wallet balance
    CheckBalance,
    /// Just talk
    #[default]
    Reply,
}

/// Parsed model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(default, deserialize_with = "nullable_action")]
    pub action: AgentAction,
}

fn nullable_action<'de, D>(deserializer: D) -> Result<AgentAction, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<AgentAction>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse the model's JSON reply
pub fn parse_reply(text: &str) -> Result<ChatReply, ChatError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ChatError::Parse(format!("{} — raw text: '{}'", e, text)))
}

/// What happened when an action ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Transferred { transfer: Transfer },
    Balance { address: String, balance: u64 },
    /// The wallet refused the action
    Rejected { reason: String },
    NoAction,
}

/// Run an action against a wallet
pub fn execute<W: Wallet + ?Sized>(action: &AgentAction, wallet: &W) -> ActionOutcome {
    match action {
        AgentAction::Transfer { to, amount } => match wallet.transfer(to, *amount) {
            Ok(transfer) => {
                tracing::info!(
                    from = %transfer.from,
                    to = %transfer.to,
                    amount = transfer.amount,
                    "Chat transfer executed"
                );
                ActionOutcome::Transferred { transfer }
            }
            Err(e) => {
                tracing::warn!(to = %to, amount, error = %e, "Chat transfer rejected");
                ActionOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        },
        AgentAction::CheckBalance => ActionOutcome::Balance {
            address: wallet.address().to_string(),
            balance: wallet.balance(),
        },
        AgentAction::Reply => ActionOutcome::NoAction,
    }
}
