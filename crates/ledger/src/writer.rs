//! Write boundary for bids, withdrawals and claims.
//!
//! Submissions are fire-and-await. A failure is logged and handed back to the
//! caller as `Error::Write`; nothing here retries.

use digichar_core::{AuctionId, CharacterIndex, Error, Result, TxHash, Wei};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{error, info};

/// Write surface of the auction ledger.
pub trait LedgerWriter: Send + Sync {
    /// Bid `value` on a character of the open auction.
    fn submit_bid(
        &self,
        index: CharacterIndex,
        value: Wei,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Withdraw part of a bid.
    fn submit_withdraw(
        &self,
        auction_id: AuctionId,
        index: CharacterIndex,
        amount: Wei,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Claim tokens from a closed auction.
    fn submit_claim(&self, auction_id: AuctionId) -> impl Future<Output = Result<TxHash>> + Send;
}

/// A user action against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LedgerAction {
    Bid {
        index: CharacterIndex,
        value: Wei,
    },
    Withdraw {
        auction_id: AuctionId,
        index: CharacterIndex,
        amount: Wei,
    },
    Claim {
        auction_id: AuctionId,
    },
}

impl LedgerAction {
    /// Reject actions the ledger would refuse outright.
    pub fn validate(&self) -> Result<()> {
        match self {
            LedgerAction::Bid { value, .. } if value.is_zero() => {
                Err(Error::write("bid value must be greater than zero"))
            }
            LedgerAction::Withdraw { amount, .. } if amount.is_zero() => {
                Err(Error::write("withdraw amount must be greater than zero"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LedgerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerAction::Bid { index, value } => write!(f, "bid {value} wei on character {index}"),
            LedgerAction::Withdraw {
                auction_id,
                index,
                amount,
            } => write!(
                f,
                "withdraw {amount} wei from character {index} of auction {auction_id}"
            ),
            LedgerAction::Claim { auction_id } => write!(f, "claim tokens of auction {auction_id}"),
        }
    }
}

/// Submit one action and report the outcome.
pub async fn submit<W: LedgerWriter>(writer: &W, action: LedgerAction) -> Result<TxHash> {
    if let Err(err) = action.validate() {
        error!(%action, %err, "action rejected before submission");
        return Err(err);
    }

    let outcome = match &action {
        LedgerAction::Bid { index, value } => writer.submit_bid(*index, *value).await,
        LedgerAction::Withdraw {
            auction_id,
            index,
            amount,
        } => writer.submit_withdraw(*auction_id, *index, *amount).await,
        LedgerAction::Claim { auction_id } => writer.submit_claim(*auction_id).await,
    };

    match outcome {
        Ok(tx_hash) => {
            info!(%action, %tx_hash, "action submitted");
            Ok(tx_hash)
        }
        Err(err) => {
            error!(%action, %err, "action failed");
            match err {
                Error::Write(_) => Err(err),
                other => Err(Error::write(format!("{action}: {other}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use digichar_core::{Address, U256};

    #[test]
    fn test_zero_bid_invalid() {
        let action = LedgerAction::Bid {
            index: CharacterIndex::ALL[0],
            value: U256::ZERO,
        };
        assert!(matches!(action.validate(), Err(Error::Write(_))));
    }

    #[tokio::test]
    async fn test_submit_bid_succeeds() {
        let ledger = MemoryLedger::demo();
        ledger.set_caller(Address::repeat_byte(0x22)).await;

        let action = LedgerAction::Bid {
            index: CharacterIndex::ALL[1],
            value: U256::from(10u64),
        };
        let tx_hash = submit(&ledger, action).await.unwrap();
        assert_ne!(tx_hash, TxHash::ZERO);
    }

    #[tokio::test]
    async fn test_failure_surfaces_as_write_error() {
        let ledger = MemoryLedger::demo();
        ledger.set_caller(Address::repeat_byte(0x99)).await;

        // The caller holds no position in auction 1.
        let action = LedgerAction::Withdraw {
            auction_id: 1,
            index: CharacterIndex::ALL[0],
            amount: U256::from(1u64),
        };
        let err = submit(&ledger, action).await.unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }
}
