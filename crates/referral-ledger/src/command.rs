use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    address::Address,
    error::LedgerResult,
    event::LedgerEvent,
    points::Points,
    roles::RoleMask,
    state::ReferralState,
};

/// A mutating call in serializable form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    UpdateRole {
        target: Address,
        mask: RoleMask,
    },
    TransferOwnership {
        new_owner: Address,
    },
    RenounceOwnership,
    IssueTo {
        account: Address,
        amount: Points,
    },
    BulkIssue {
        accounts: Vec<Address>,
        amounts: Vec<Points>,
    },
    ConsumeFrom {
        account: Address,
        amount: Points,
    },
    BulkConsume {
        accounts: Vec<Address>,
        amounts: Vec<Points>,
    },
    AddKnownAddress {
        account: Address,
    },
    BulkAddKnownAddresses {
        accounts: Vec<Address>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::UpdateRole { .. } => "update_role",
            Command::TransferOwnership { .. } => "transfer_ownership",
            Command::RenounceOwnership => "renounce_ownership",
            Command::IssueTo { .. } => "issue_to",
            Command::BulkIssue { .. } => "bulk_issue",
            Command::ConsumeFrom { .. } => "consume_from",
            Command::BulkConsume { .. } => "bulk_consume",
            Command::AddKnownAddress { .. } => "add_known_address",
            Command::BulkAddKnownAddresses { .. } => "bulk_add_known_addresses",
        }
    }
}

impl ReferralState {
    /// Run one command on behalf of `caller`, returning the events it emitted.
    pub fn execute(
        &mut self,
        caller: &Address,
        command: &Command,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        let start = self.events.len();

        let outcome = match command {
            Command::UpdateRole { target, mask } => self.update_role(caller, *target, *mask),
            Command::TransferOwnership { new_owner } => self.transfer_ownership(caller, *new_owner),
            Command::RenounceOwnership => self.renounce_ownership(caller),
            Command::IssueTo { account, amount } => self.issue_to(caller, *account, *amount),
            Command::BulkIssue { accounts, amounts } => self.bulk_issue(caller, accounts, amounts),
            Command::ConsumeFrom { account, amount } => {
                self.consume_from(caller, *account, *amount)
            }
            Command::BulkConsume { accounts, amounts } => {
                self.bulk_consume(caller, accounts, amounts)
            }
            Command::AddKnownAddress { account } => self.add_known_address(caller, *account),
            Command::BulkAddKnownAddresses { accounts } => {
                self.bulk_add_known_addresses(caller, accounts)
            }
        };

        if let Err(err) = &outcome {
            warn!(%caller, command = command.name(), error = %err, "command rejected");
        }
        outcome?;

        Ok(self.events[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{error::LedgerError, roles::Role};

    #[test]
    fn command_json_shape() {
        let json = r#"[
            {"type": "update_role", "target": "0x00000000000000000000000000000000000000f1", "mask": 1},
            {"type": "bulk_issue",
             "accounts": ["0x0000000000000000000000000000000000000001", "0x0000000000000000000000000000000000000002"],
             "amounts": ["5", "7"]},
            {"type": "renounce_ownership"}
        ]"#;
        let commands: Vec<Command> = serde_json::from_str(json).unwrap();
        assert_eq!(
            commands,
            vec![
                Command::UpdateRole {
                    target: Address::mock(0xf1),
                    mask: Role::Issuer.into(),
                },
                Command::BulkIssue {
                    accounts: vec![Address::mock(1), Address::mock(2)],
                    amounts: vec![Points::from(5u64), Points::from(7u64)],
                },
                Command::RenounceOwnership,
            ]
        );
    }

    #[test]
    fn execute_returns_emitted_events() {
        let owner = Address::mock(0xff);
        let issuer = Address::mock(0xf1);
        let mut state = ReferralState::new(owner);

        let events = state
            .execute(
                &owner,
                &Command::UpdateRole {
                    target: issuer,
                    mask: Role::Issuer.into(),
                },
            )
            .unwrap();
        assert_eq!(events.len(), 1);

        let events = state
            .execute(
                &issuer,
                &Command::IssueTo {
                    account: Address::mock(1),
                    amount: Points::from(3u64),
                },
            )
            .unwrap();
        assert_eq!(
            events,
            vec![LedgerEvent::PointsIssued {
                account: Address::mock(1),
                amount: Points::from(3u64),
                issued: Points::from(3u64),
            }]
        );

        let err = state
            .execute(
                &issuer,
                &Command::ConsumeFrom {
                    account: Address::mock(1),
                    amount: Points::from(1u64),
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unauthorized { .. }));
        assert_eq!(state.events().len(), 2);
    }
}
