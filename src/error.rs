use std::fmt;

use thiserror::Error;

use crate::effort::PolicyViolation;
use crate::wallet::VerifyFailure;

/// Which party's signature failed in a proof bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    User,
    Validator,
}

impl fmt::Display for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signer::User => f.write_str("user"),
            Signer::Validator => f.write_str("validator"),
        }
    }
}

/// Rejections returned by the ledger. None of them mutate the chain.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error(
        "{signer} signature invalid{}",
        .failure.map(|f| format!(": {f}")).unwrap_or_default()
    )]
    SignatureInvalid {
        signer: Signer,
        failure: Option<VerifyFailure>,
    },

    #[error("wallet mismatch: {0}")]
    WalletMismatch(String),

    #[error("effort rejected by policy: {0}")]
    PolicyRejected(#[from] PolicyViolation),

    #[error("block does not link to the chain: {0}")]
    ChainLinkInvalid(String),
}

/// Failure talking to a single peer. Always non-fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer timed out")]
    Timeout,

    #[error("peer answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("peer sent an unusable response: {0}")]
    BadResponse(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet already registered for {0}")]
    AlreadyRegistered(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid secret key")]
    InvalidSecretKey,
}
