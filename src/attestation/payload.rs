//! Wire encoding of attestations.
//!
//! `abi.encode((uint80,int256,uint256,uint256,uint80), uint8, bytes32, bytes32)`,
//! the calldata the destination bulletin decodes in `xReceive`.

use alloy::{primitives::Bytes, sol, sol_types::SolValue};

use super::{round_digest, Attestation, AttestationDomain, AttestationSignature, RoundData};
use crate::{error::Result, types::Round};

// A static tuple encodes inline, so the flattened fields produce the same
// eight words as the nested `(RoundData, v, r, s)` form.
sol! {
    struct AttestationPayload {
        uint80 roundId;
        int256 answer;
        uint256 startedAt;
        uint256 updatedAt;
        uint80 answeredInRound;
        uint8 v;
        bytes32 r;
        bytes32 s;
    }
}

impl From<&Attestation> for AttestationPayload {
    fn from(attestation: &Attestation) -> Self {
        let round = RoundData::from(&attestation.round);
        let AttestationSignature { v, r, s } = attestation.signature;
        Self {
            roundId: round.roundId,
            answer: round.answer,
            startedAt: round.startedAt,
            updatedAt: round.updatedAt,
            answeredInRound: round.answeredInRound,
            v,
            r,
            s,
        }
    }
}

/// Encode an attestation as bridge calldata.
pub fn encode_payload(attestation: &Attestation) -> Bytes {
    Bytes::from(AttestationPayload::from(attestation).abi_encode())
}

/// Decode bridge calldata into an attestation.
///
/// The payload carries no digest; it is recomputed under the receiving
/// `domain`, exactly as the destination verifier does.
pub fn decode_payload(data: &[u8], domain: &AttestationDomain) -> Result<Attestation> {
    let payload = AttestationPayload::abi_decode(data)?;
    let round = Round::try_from(&RoundData {
        roundId: payload.roundId,
        answer: payload.answer,
        startedAt: payload.startedAt,
        updatedAt: payload.updatedAt,
        answeredInRound: payload.answeredInRound,
    })?;

    Ok(Attestation {
        round,
        signature: AttestationSignature { v: payload.v, r: payload.r, s: payload.s },
        digest: round_digest(&round, domain),
    })
}
