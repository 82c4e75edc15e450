//! Conversions between domain types and their persisted protobuf layouts.
//!
//! The protobuf schema is the storage and transfer format only; the signing
//! preimage of a header is its canonical encoding, not its protobuf bytes.

use bytes::Bytes;
use ed25519_dalek::{Signature, VerifyingKey};
use prost::Message;
use thiserror::Error;

use crate::{
    block::{Block, SignedHeader},
    commit::Commit,
    data::Data,
    hash::Hash,
    header::{Header, Version},
    proto,
    state::{ConsensusParams, State},
    validator_set::{Validator, ValidatorSet},
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode protobuf: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field {field} holds {len} bytes, expected a 32-byte hash")]
    InvalidHashLength { field: &'static str, len: usize },

    #[error("invalid ed25519 public key")]
    InvalidPublicKey,

    #[error("invalid ed25519 signature")]
    InvalidSignature,

    #[error("chain id is not valid UTF-8")]
    InvalidChainId,

    #[error("truncated canonical header")]
    TruncatedHeader,

    #[error("{remaining} trailing bytes after canonical header")]
    TrailingBytes { remaining: usize },
}

/// Two-way conversion between a domain type and its protobuf message.
pub trait Protobuf: Sized {
    type Proto: Message + Default;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError>;

    fn to_proto(&self) -> Self::Proto;

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_proto(Self::Proto::decode(bytes)?)
    }

    fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_proto().encode_to_vec())
    }
}

fn hash_from(field: &'static str, bytes: &Bytes) -> Result<Hash, CodecError> {
    Hash::try_from(bytes.as_ref())
        .map_err(|len| CodecError::InvalidHashLength { field, len })
}

impl Protobuf for Version {
    type Proto = proto::Version;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        Ok(Self { block: proto.block, app: proto.app })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Version { block: self.block, app: self.app }
    }
}

impl Protobuf for Header {
    type Proto = proto::Header;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let version = proto.version.ok_or(CodecError::MissingField("version"))?;
        Ok(Self {
            height: proto.height,
            time: proto.time,
            chain_id: proto.chain_id,
            version: Version::from_proto(version)?,
            last_header_hash: hash_from("last_header_hash", &proto.last_header_hash)?,
            last_commit_hash: hash_from("last_commit_hash", &proto.last_commit_hash)?,
            data_hash: hash_from("data_hash", &proto.data_hash)?,
            consensus_hash: hash_from("consensus_hash", &proto.consensus_hash)?,
            app_hash: hash_from("app_hash", &proto.app_hash)?,
            last_results_hash: hash_from("last_results_hash", &proto.last_results_hash)?,
            proposer_address: proto.proposer_address,
            aggregators_hash: hash_from("aggregators_hash", &proto.aggregators_hash)?,
            next_aggregators_hash: hash_from(
                "next_aggregators_hash",
                &proto.next_aggregators_hash,
            )?,
        })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Header {
            height: self.height,
            time: self.time,
            chain_id: self.chain_id.clone(),
            version: Some(self.version.to_proto()),
            last_header_hash: Bytes::copy_from_slice(self.last_header_hash.as_ref()),
            last_commit_hash: Bytes::copy_from_slice(self.last_commit_hash.as_ref()),
            data_hash: Bytes::copy_from_slice(self.data_hash.as_ref()),
            consensus_hash: Bytes::copy_from_slice(self.consensus_hash.as_ref()),
            app_hash: Bytes::copy_from_slice(self.app_hash.as_ref()),
            last_results_hash: Bytes::copy_from_slice(self.last_results_hash.as_ref()),
            proposer_address: self.proposer_address.clone(),
            aggregators_hash: Bytes::copy_from_slice(self.aggregators_hash.as_ref()),
            next_aggregators_hash: Bytes::copy_from_slice(self.next_aggregators_hash.as_ref()),
        }
    }
}

impl Protobuf for Commit {
    type Proto = proto::Commit;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let signatures = proto
            .signatures
            .iter()
            .map(|bytes| {
                Signature::from_slice(bytes).map_err(|_| CodecError::InvalidSignature)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            height: proto.height,
            header_hash: hash_from("header_hash", &proto.header_hash)?,
            signatures,
        })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Commit {
            height: self.height,
            header_hash: Bytes::copy_from_slice(self.header_hash.as_ref()),
            signatures: self
                .signatures
                .iter()
                .map(|signature| Bytes::copy_from_slice(&signature.to_bytes()))
                .collect(),
        }
    }
}

impl Protobuf for Data {
    type Proto = proto::Data;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let intermediate_state_roots = proto
            .intermediate_state_roots
            .iter()
            .map(|bytes| hash_from("intermediate_state_roots", bytes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { txs: proto.txs, intermediate_state_roots })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Data {
            txs: self.txs.clone(),
            intermediate_state_roots: self
                .intermediate_state_roots
                .iter()
                .map(|root| Bytes::copy_from_slice(root.as_ref()))
                .collect(),
        }
    }
}

impl Protobuf for Validator {
    type Proto = proto::Validator;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let key_bytes: [u8; 32] =
            proto.public_key.as_ref().try_into().map_err(|_| CodecError::InvalidPublicKey)?;
        let public_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| CodecError::InvalidPublicKey)?;
        Ok(Self { public_key, voting_power: proto.voting_power })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Validator {
            public_key: Bytes::copy_from_slice(self.public_key.as_bytes()),
            voting_power: self.voting_power,
        }
    }
}

impl Protobuf for ValidatorSet {
    type Proto = proto::ValidatorSet;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let proposer = proto.proposer.ok_or(CodecError::MissingField("proposer"))?;
        let validators = proto
            .validators
            .into_iter()
            .map(Validator::from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { proposer: Validator::from_proto(proposer)?, validators })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::ValidatorSet {
            proposer: Some(self.proposer.to_proto()),
            validators: self.validators.iter().map(Validator::to_proto).collect(),
        }
    }
}

impl Protobuf for SignedHeader {
    type Proto = proto::SignedHeader;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let header = proto.header.ok_or(CodecError::MissingField("header"))?;
        let last_commit = proto.last_commit.ok_or(CodecError::MissingField("last_commit"))?;
        let validators = proto.validators.ok_or(CodecError::MissingField("validators"))?;
        Ok(Self {
            header: Header::from_proto(header)?,
            last_commit: Commit::from_proto(last_commit)?,
            validators: ValidatorSet::from_proto(validators)?,
        })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::SignedHeader {
            header: Some(self.header.to_proto()),
            last_commit: Some(self.last_commit.to_proto()),
            validators: Some(self.validators.to_proto()),
        }
    }
}

impl Protobuf for Block {
    type Proto = proto::Block;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let signed_header = proto.signed_header.ok_or(CodecError::MissingField("signed_header"))?;
        Ok(Self {
            signed_header: SignedHeader::from_proto(signed_header)?,
            data: Data::from_proto(proto.data.unwrap_or_default())?,
        })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::Block {
            signed_header: Some(self.signed_header.to_proto()),
            data: Some(self.data.to_proto()),
        }
    }
}

impl Protobuf for ConsensusParams {
    type Proto = proto::ConsensusParams;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        Ok(Self { max_block_bytes: proto.max_block_bytes })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::ConsensusParams { max_block_bytes: self.max_block_bytes }
    }
}

impl Protobuf for State {
    type Proto = proto::State;

    fn from_proto(proto: Self::Proto) -> Result<Self, CodecError> {
        let version = proto.version.ok_or(CodecError::MissingField("version"))?;
        let validators = proto.validators.ok_or(CodecError::MissingField("validators"))?;
        let next_validators =
            proto.next_validators.ok_or(CodecError::MissingField("next_validators"))?;
        let consensus_params =
            proto.consensus_params.ok_or(CodecError::MissingField("consensus_params"))?;
        Ok(Self {
            version: Version::from_proto(version)?,
            chain_id: proto.chain_id,
            initial_height: proto.initial_height,
            last_block_height: proto.last_block_height,
            last_block_hash: hash_from("last_block_hash", &proto.last_block_hash)?,
            last_block_time: proto.last_block_time,
            validators: ValidatorSet::from_proto(validators)?,
            next_validators: ValidatorSet::from_proto(next_validators)?,
            consensus_params: ConsensusParams::from_proto(consensus_params)?,
            last_results_hash: hash_from("last_results_hash", &proto.last_results_hash)?,
            app_hash: hash_from("app_hash", &proto.app_hash)?,
        })
    }

    fn to_proto(&self) -> Self::Proto {
        proto::State {
            version: Some(self.version.to_proto()),
            chain_id: self.chain_id.clone(),
            initial_height: self.initial_height,
            last_block_height: self.last_block_height,
            last_block_hash: Bytes::copy_from_slice(self.last_block_hash.as_ref()),
            last_block_time: self.last_block_time,
            validators: Some(self.validators.to_proto()),
            next_validators: Some(self.next_validators.to_proto()),
            consensus_params: Some(self.consensus_params.to_proto()),
            last_results_hash: Bytes::copy_from_slice(self.last_results_hash.as_ref()),
            app_hash: Bytes::copy_from_slice(self.app_hash.as_ref()),
        }
    }
}
