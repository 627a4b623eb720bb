use std::sync::Arc;

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::blockchain::{Block, EffortData, efforts_in_period};
use crate::wallet::WalletDirectory;

/// Default cap on a single effort claim (12h).
pub const DEFAULT_MAX_MINUTES: u32 = 720;

/// Default number of efforts one user may record per period.
pub const DEFAULT_MAX_PER_PERIOD: usize = 5;

pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Closed schema an effort payload must satisfy to be admitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffortRecord {
    pub user_id: String,
    pub activity: String,
    /// Reporting period label, e.g. "2024-W10".
    pub period: String,
    pub minutes: u32,
    #[serde(default)]
    pub description: Option<String>,
}

impl EffortRecord {
    /// Parse `data`, trimming the fields that identify a claim.
    pub fn parse(data: &EffortData) -> Result<Self, PolicyViolation> {
        let mut record: Self = serde_json::from_value(Value::Object(data.clone()))
            .map_err(|e| PolicyViolation::Schema(e.to_string()))?;
        for field in [&mut record.user_id, &mut record.activity, &mut record.period] {
            *field = field.trim().to_string();
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("{0} is not an authorized validator")]
    UnauthorizedValidator(String),

    #[error("effort data does not match schema: {0}")]
    Schema(String),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("minutes must be between 1 and {max}, got {got}")]
    OutOfRange { got: u32, max: u32 },

    #[error("description longer than 500 characters")]
    DescriptionTooLong,

    #[error("validators cannot attest their own effort")]
    SelfAttestation,

    #[error("effort already recorded for {user_id} ({activity}, {period})")]
    Replay {
        user_id: String,
        activity: String,
        period: String,
    },

    #[error("{user_id} already has {limit} efforts in period {period}")]
    RateLimited {
        user_id: String,
        period: String,
        limit: usize,
    },
}

/// Domain admission rules applied after both signatures check out.
pub trait EffortPolicy: Send + Sync {
    /// Decide whether `effort` may be appended on top of `history`.
    fn admit(
        &self,
        effort: &EffortData,
        validator_id: &str,
        history: &[Block],
    ) -> Result<(), PolicyViolation>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortLimits {
    pub max_minutes: u32,
    pub max_per_period: usize,
}

impl Default for EffortLimits {
    fn default() -> Self {
        Self {
            max_minutes: DEFAULT_MAX_MINUTES,
            max_per_period: DEFAULT_MAX_PER_PERIOD,
        }
    }
}

pub struct StandardEffortPolicy {
    wallets: Arc<dyn WalletDirectory>,
    limits: EffortLimits,
}

impl StandardEffortPolicy {
    pub fn new(wallets: Arc<dyn WalletDirectory>, limits: EffortLimits) -> Self {
        Self { wallets, limits }
    }
}

impl EffortPolicy for StandardEffortPolicy {
    fn admit(
        &self,
        effort: &EffortData,
        validator_id: &str,
        history: &[Block],
    ) -> Result<(), PolicyViolation> {
        if !self.wallets.is_validator(validator_id) {
            return Err(PolicyViolation::UnauthorizedValidator(validator_id.to_string()));
        }

        let record = EffortRecord::parse(effort)?;
        for (name, value) in [
            ("user_id", &record.user_id),
            ("activity", &record.activity),
            ("period", &record.period),
        ] {
            if value.is_empty() {
                return Err(PolicyViolation::EmptyField(name));
            }
            if effort.get(name).and_then(Value::as_str) != Some(value.as_str()) {
                return Err(PolicyViolation::Schema(format!(
                    "`{name}` has surrounding whitespace"
                )));
            }
        }
        if record.minutes == 0 || record.minutes > self.limits.max_minutes {
            return Err(PolicyViolation::OutOfRange {
                got: record.minutes,
                max: self.limits.max_minutes,
            });
        }
        if record
            .description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
        {
            return Err(PolicyViolation::DescriptionTooLong);
        }
        if record.user_id == validator_id {
            return Err(PolicyViolation::SelfAttestation);
        }

        // Blocks that don't parse were admitted under older rules; they
        // neither count toward the limit nor block a replay.
        let mut in_period = 0;
        for past in efforts_in_period(history, &record.user_id, &record.period)
            .filter_map(|b| EffortRecord::parse(&b.effort_data).ok())
        {
            if past.activity == record.activity {
                return Err(PolicyViolation::Replay {
                    user_id: record.user_id.clone(),
                    activity: record.activity.clone(),
                    period: record.period.clone(),
                });
            }
            in_period += 1;
        }
        if in_period >= self.limits.max_per_period {
            return Err(PolicyViolation::RateLimited {
                user_id: record.user_id,
                period: record.period,
                limit: self.limits.max_per_period,
            });
        }

        debug!(
            "policy admitted effort of {} ({}, {}) validated by {}",
            record.user_id, record.activity, record.period, validator_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Blockchain, ProofBundle};
    use crate::wallet::{InMemoryWallets, Role, generate_keypair_hex};
    use serde_json::json;

    fn effort(user: &str, activity: &str, period: &str, minutes: u32) -> EffortData {
        let mut data = EffortData::new();
        data.insert("user_id".into(), json!(user));
        data.insert("activity".into(), json!(activity));
        data.insert("period".into(), json!(period));
        data.insert("minutes".into(), json!(minutes));
        data
    }

    fn policy(limits: EffortLimits) -> StandardEffortPolicy {
        let wallets = InMemoryWallets::new();
        let (_, pk) = generate_keypair_hex();
        wallets.register("vera", &pk, Role::Validator).unwrap();
        let (_, pk) = generate_keypair_hex();
        wallets.register("alice", &pk, Role::Student).unwrap();
        StandardEffortPolicy::new(Arc::new(wallets), limits)
    }

    fn chain_with(efforts: Vec<EffortData>) -> Blockchain {
        let mut bc = Blockchain::new();
        for data in efforts {
            let next = Block::next(
                bc.last_block(),
                data,
                "vera".into(),
                ProofBundle::default(),
                "pk".into(),
            );
            bc.append(next).unwrap();
        }
        bc
    }

    #[test]
    fn admits_well_formed_effort() {
        let p = policy(EffortLimits::default());
        let bc = Blockchain::new();
        assert_eq!(
            p.admit(&effort("alice", "lab", "w1", 90), "vera", bc.blocks()),
            Ok(())
        );
    }

    #[test]
    fn rejects_non_validator() {
        let p = policy(EffortLimits::default());
        let bc = Blockchain::new();
        assert_eq!(
            p.admit(&effort("bob", "lab", "w1", 90), "alice", bc.blocks()),
            Err(PolicyViolation::UnauthorizedValidator("alice".into()))
        );
    }

    #[test]
    fn rejects_schema_and_range_problems() {
        let p = policy(EffortLimits::default());
        let bc = Blockchain::new();

        let mut extra = effort("alice", "lab", "w1", 90);
        extra.insert("bonus".into(), json!(1));
        assert!(matches!(
            p.admit(&extra, "vera", bc.blocks()),
            Err(PolicyViolation::Schema(_))
        ));

        let mut missing = effort("alice", "lab", "w1", 90);
        missing.remove("period");
        assert!(matches!(
            p.admit(&missing, "vera", bc.blocks()),
            Err(PolicyViolation::Schema(_))
        ));

        assert_eq!(
            p.admit(&effort("alice", "  ", "w1", 90), "vera", bc.blocks()),
            Err(PolicyViolation::EmptyField("activity"))
        );
        assert_eq!(
            p.admit(&effort("alice", "lab", "w1", 0), "vera", bc.blocks()),
            Err(PolicyViolation::OutOfRange { got: 0, max: 720 })
        );
        assert_eq!(
            p.admit(&effort("alice", "lab", "w1", 721), "vera", bc.blocks()),
            Err(PolicyViolation::OutOfRange { got: 721, max: 720 })
        );

        let mut long = effort("alice", "lab", "w1", 90);
        long.insert("description".into(), json!("x".repeat(501)));
        assert_eq!(
            p.admit(&long, "vera", bc.blocks()),
            Err(PolicyViolation::DescriptionTooLong)
        );
    }

    #[test]
    fn rejects_self_attestation() {
        let p = policy(EffortLimits::default());
        let bc = Blockchain::new();
        assert_eq!(
            p.admit(&effort("vera", "lab", "w1", 30), "vera", bc.blocks()),
            Err(PolicyViolation::SelfAttestation)
        );
    }

    #[test]
    fn rejects_replay_of_recorded_effort() {
        let p = policy(EffortLimits::default());
        let bc = chain_with(vec![effort("alice", "lab", "w1", 90)]);

        assert!(matches!(
            p.admit(&effort("alice", "lab", "w1", 30), "vera", bc.blocks()),
            Err(PolicyViolation::Replay { .. })
        ));
        assert_eq!(
            p.admit(&effort("alice", "lab", "w2", 30), "vera", bc.blocks()),
            Ok(())
        );
    }

    #[test]
    fn rate_limits_per_user_and_period() {
        let p = policy(EffortLimits {
            max_minutes: 720,
            max_per_period: 2,
        });
        let bc = chain_with(vec![
            effort("alice", "lab", "w1", 90),
            effort("alice", "reading", "w1", 90),
            effort("bob", "lab", "w1", 90),
        ]);

        assert_eq!(
            p.admit(&effort("alice", "tutoring", "w1", 30), "vera", bc.blocks()),
            Err(PolicyViolation::RateLimited {
                user_id: "alice".into(),
                period: "w1".into(),
                limit: 2
            })
        );
        assert_eq!(
            p.admit(&effort("bob", "tutoring", "w1", 30), "vera", bc.blocks()),
            Ok(())
        );
    }

    #[test]
    fn padded_keys_neither_replay_nor_dodge_the_limit() {
        let p = policy(EffortLimits {
            max_minutes: 720,
            max_per_period: 1,
        });
        let bc = Blockchain::new();
        for (activity, period) in [
            ("lab ", "w1"),
            ("lab", "w1 "),
            ("lab", " w1"),
            ("lab", "w1  "),
        ] {
            assert!(
                matches!(
                    p.admit(&effort("alice", activity, period, 30), "vera", bc.blocks()),
                    Err(PolicyViolation::Schema(_))
                ),
                "{activity:?}/{period:?} was admitted"
            );
        }

        // Padded history written by a peer still counts against the period.
        let bc = chain_with(vec![effort("alice", "lab ", " w1", 90)]);
        assert!(matches!(
            p.admit(&effort("alice", "lab", "w1", 30), "vera", bc.blocks()),
            Err(PolicyViolation::Replay { .. })
        ));
        assert_eq!(
            p.admit(&effort("alice", "reading", "w1", 30), "vera", bc.blocks()),
            Err(PolicyViolation::RateLimited {
                user_id: "alice".into(),
                period: "w1".into(),
                limit: 1
            })
        );
    }
}
