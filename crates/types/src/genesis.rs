use serde::{Deserialize, Serialize};

use crate::{state::ConsensusParams, validator_set::ValidatorSet};

/// Genesis document: everything needed to bootstrap a chain from nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genesis {
    pub chain_id: String,
    /// Height of the first block; `Store::height()` reports
    /// `initial_height - 1` while the chain is empty.
    pub initial_height: u64,
    /// Unix nanoseconds.
    pub genesis_time: u64,
    pub validator_set: ValidatorSet,
    #[serde(default)]
    pub consensus_params: ConsensusParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_genesis;

    #[test]
    fn genesis_round_trips_through_json() {
        let (genesis, _) = test_genesis("json-chain", 5);
        let encoded = serde_json::to_string(&genesis).unwrap();
        let decoded: Genesis = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, genesis);
    }
}
