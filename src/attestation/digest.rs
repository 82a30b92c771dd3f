//! EIP-712 digest construction for rounds.
//!
//! Everything here is pure: the same round and domain produce the same digest
//! on the origin and on every destination.

use std::borrow::Cow;

use alloy::{
    primitives::{aliases::U80, keccak256, Address, Signature, B256, I256, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};

use crate::{
    error::{AppError, Result},
    types::Round,
};

// Field layout shared with the on-chain verifier.
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct RoundData {
        uint80 roundId;
        int256 answer;
        uint256 startedAt;
        uint256 updatedAt;
        uint80 answeredInRound;
    }
}

/// EIP-712 domain shared by the signer and every verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationDomain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// Origin chain id. Destinations use the origin's id, not their own.
    pub chain_id: u64,
    /// Origin aggregator address.
    pub verifying_contract: Address,
}

impl AttestationDomain {
    /// Create a new domain.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self { name: name.into(), version: version.into(), chain_id, verifying_contract }
    }

    /// The alloy representation of this domain.
    pub fn eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(Cow::Owned(self.name.clone())),
            Some(Cow::Owned(self.version.clone())),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }

    /// `keccak256(abi.encode(EIP712Domain typehash, name, version, chainId, verifyingContract))`.
    pub fn separator(&self) -> B256 {
        self.eip712().separator()
    }
}

impl From<&Round> for RoundData {
    fn from(round: &Round) -> Self {
        Self {
            roundId: U80::from(round.round_id),
            answer: i128_to_i256(round.answer),
            startedAt: U256::from(round.started_at),
            updatedAt: U256::from(round.updated_at),
            answeredInRound: U80::from(round.answered_in_round),
        }
    }
}

impl TryFrom<&RoundData> for Round {
    type Error = AppError;

    fn try_from(data: &RoundData) -> Result<Self> {
        Ok(Round {
            round_id: narrow_u64(data.roundId, "roundId")?,
            answer: i256_to_i128(data.answer)?,
            started_at: narrow_u64(data.startedAt, "startedAt")?,
            updated_at: narrow_u64(data.updatedAt, "updatedAt")?,
            answered_in_round: narrow_u64(data.answeredInRound, "answeredInRound")?,
        })
    }
}

fn narrow_u64<T>(value: T, field: &str) -> Result<u64>
where
    u64: TryFrom<T>,
{
    u64::try_from(value).map_err(|_| AppError::Payload(format!("{} out of range", field)))
}

/// Sign-extend an i128 into an int256.
fn i128_to_i256(value: i128) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Narrow an int256 to i128.
pub(crate) fn i256_to_i128(value: I256) -> Result<i128> {
    let out_of_range = || AppError::Payload(format!("answer {} out of range", value));

    let magnitude: u128 = value.unsigned_abs().try_into().map_err(|_| out_of_range())?;
    if value.is_negative() {
        0i128.checked_sub_unsigned(magnitude).ok_or_else(out_of_range)
    } else {
        i128::try_from(magnitude).map_err(|_| out_of_range())
    }
}

/// EIP-712 struct hash of a round.
pub fn struct_hash(round: &Round) -> B256 {
    RoundData::from(round).eip712_hash_struct()
}

/// `keccak256(0x1901 || domainSeparator || structHash)`.
pub fn typed_data_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain_separator.as_slice());
    buf[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Final digest signed by the publisher and recomputed by verifiers.
pub fn round_digest(round: &Round, domain: &AttestationDomain) -> B256 {
    typed_data_digest(domain.separator(), struct_hash(round))
}

/// Recompute the digest for `round` and recover who signed it.
pub fn recover_publisher(
    round: &Round,
    signature: &Signature,
    domain: &AttestationDomain,
) -> Result<(B256, Address)> {
    let digest = round_digest(round, domain);
    let signer = signature
        .recover_address_from_prehash(&digest)
        .map_err(|e| AppError::InvalidSignature(e.to_string()))?;
    Ok((digest, signer))
}
