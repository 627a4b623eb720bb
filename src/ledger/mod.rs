use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use crate::blockchain::{Block, Blockchain, EffortData, ProofBundle};
use crate::effort::EffortPolicy;
use crate::error::{LedgerError, Signer};
use crate::wallet::{Verbosity, WalletDirectory, normalize_public_key_hex, verify_proof};

/// An effort claim together with its proof, as submitted by a client.
#[derive(Debug, Clone)]
pub struct EffortSubmission {
    pub effort_data: EffortData,
    pub validated_by: String,
    pub proof: ProofBundle,
    pub user_public_key: String,
}

/// Gates a submission passes through on its way into the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStage {
    Received,
    SignatureChecked,
    PolicyChecked,
    Linked,
    Appended,
}

impl fmt::Display for AdmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdmissionStage::Received => "received",
            AdmissionStage::SignatureChecked => "signature-checked",
            AdmissionStage::PolicyChecked => "policy-checked",
            AdmissionStage::Linked => "linked",
            AdmissionStage::Appended => "appended",
        };
        f.write_str(name)
    }
}

/// Owner of the authoritative chain. All mutations go through the write
/// lock, held across the whole check-then-append sequence.
pub struct Ledger {
    chain: RwLock<Blockchain>,
    wallets: Arc<dyn WalletDirectory>,
    policy: Arc<dyn EffortPolicy>,
    verbosity: Verbosity,
}

impl Ledger {
    pub fn new(
        wallets: Arc<dyn WalletDirectory>,
        policy: Arc<dyn EffortPolicy>,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            chain: RwLock::new(Blockchain::new()),
            wallets,
            policy,
            verbosity,
        }
    }

    // A panicking holder never leaves the chain half-written: every
    // mutation is a single push or a whole-vector swap.
    fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Blockchain> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_block(&self) -> Block {
        self.read().last_block().clone()
    }

    pub fn height(&self) -> usize {
        self.read().len()
    }

    /// Snapshot of the full chain, oldest first.
    pub fn export(&self) -> Vec<Block> {
        self.read().blocks().to_vec()
    }

    pub fn is_valid_chain(&self) -> bool {
        self.read().is_valid_chain()
    }

    pub fn efforts_for_user(&self, user_id: &str) -> Vec<Block> {
        self.read().efforts_for_user(user_id).cloned().collect()
    }

    pub fn efforts_in_period(&self, user_id: &str, period: &str) -> Vec<Block> {
        self.read().efforts_in_period(user_id, period).cloned().collect()
    }

    /// Run a submission through every admission gate and append it.
    pub fn add_block(&self, submission: EffortSubmission) -> Result<Block, LedgerError> {
        let mut stage = AdmissionStage::Received;
        let outcome = self.admit(submission, &mut stage);
        match &outcome {
            Ok(block) => info!(
                "LEDGER - appended block #{} (hash={}, validated_by={})",
                block.index, block.hash, block.validated_by
            ),
            Err(e) => warn!("LEDGER - submission rejected after stage {stage}: {e}"),
        }
        outcome
    }

    fn admit(
        &self,
        submission: EffortSubmission,
        stage: &mut AdmissionStage,
    ) -> Result<Block, LedgerError> {
        let EffortSubmission {
            effort_data,
            validated_by,
            proof,
            user_public_key,
        } = submission;

        let user_id = effort_data
            .get("user_id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LedgerError::MalformedBlock("effort_data.user_id missing".into()))?;

        // Wallet checks come before any signature work.
        let registered = self.wallets.resolve_public_key(user_id).ok_or_else(|| {
            LedgerError::WalletMismatch(format!("no wallet registered for {user_id}"))
        })?;
        let claimed = normalize_public_key_hex(&user_public_key).ok();
        if claimed.as_deref() != Some(registered.as_str()) {
            return Err(LedgerError::WalletMismatch(format!(
                "claimed public key is not the registered key of {user_id}"
            )));
        }
        let validator_key = self.wallets.resolve_public_key(&validated_by).ok_or_else(|| {
            LedgerError::WalletMismatch(format!("no wallet registered for validator {validated_by}"))
        })?;
        if !self.wallets.is_validator(&validated_by) {
            return Err(LedgerError::WalletMismatch(format!(
                "{validated_by} lacks validator authorization"
            )));
        }

        let user_check = verify_proof(
            &effort_data,
            &proof.user_signature,
            &user_public_key,
            self.verbosity,
        );
        if !user_check.valid {
            return Err(LedgerError::SignatureInvalid {
                signer: Signer::User,
                failure: user_check.diagnostic,
            });
        }
        let validator_check = verify_proof(
            &effort_data,
            &proof.validator_signature,
            &validator_key,
            self.verbosity,
        );
        if !validator_check.valid {
            return Err(LedgerError::SignatureInvalid {
                signer: Signer::Validator,
                failure: validator_check.diagnostic,
            });
        }
        *stage = AdmissionStage::SignatureChecked;
        debug!("LEDGER - signatures verified for {user_id}");

        let mut chain = self.write();
        self.policy
            .admit(&effort_data, &validated_by, chain.blocks())?;
        *stage = AdmissionStage::PolicyChecked;

        let block = Block::next(
            chain.last_block(),
            effort_data,
            validated_by,
            proof,
            user_public_key,
        );
        *stage = AdmissionStage::Linked;

        let appended = chain.append(block)?.clone();
        *stage = AdmissionStage::Appended;
        Ok(appended)
    }

    /// Admit a block pushed by a peer. Only linkage and the content hash
    /// are checked; signatures and policy were enforced by the origin node.
    pub fn accept_external_block(&self, block: Block) -> Result<(), LedgerError> {
        let mut chain = self.write();
        let index = block.index;
        match chain.append(block) {
            Ok(_) => {
                info!("LEDGER - accepted peer block #{index}");
                Ok(())
            }
            Err(e) => {
                warn!("LEDGER - rejected peer block #{index}: {e}");
                Err(e)
            }
        }
    }

    /// Atomically adopt `candidate` if it is valid and strictly longer.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        let candidate_len = candidate.len();
        let mut chain = self.write();
        let previous_len = chain.len();
        let replaced = chain.replace(candidate);
        if replaced {
            info!("LEDGER - chain replaced: {previous_len} -> {candidate_len} blocks");
        }
        replaced
    }
}
