//! Typed decoding of state-bearing pool logs.
//!
//! Creation events are handled by the resolver; this module covers the
//! events that mutate already-discovered pools. Unknown topic0 values are
//! not an error, a known signature with an undecodable payload is.

use alloy::{primitives::LogData, sol_types::SolEvent};

use crate::{
    abis::{v2, v3, v4},
    error::EngineError,
    rpc::LogEntry,
    utils::hex_encode,
};

/// A decoded pool mutation, still carrying the raw event struct.
pub enum PoolEvent {
    V2Sync(v2::Sync),
    V2Swap(v2::Swap),
    V2Mint(v2::Mint),
    V2Burn(v2::Burn),
    V3Initialize(v3::Initialize),
    V3Swap(v3::Swap),
    V3Mint(v3::Mint),
    V3Burn(v3::Burn),
    V4Swap(v4::Swap),
    V4ModifyLiquidity(v4::ModifyLiquidity),
}

impl PoolEvent {
    /// Key of the pool this event belongs to: the emitting contract for
    /// V2/V3, the event's pool id for V4 (which is emitted by the shared
    /// pool manager).
    pub fn pool_key(&self, log: &LogEntry) -> String {
        match self {
            PoolEvent::V4Swap(event) => hex_encode(event.id.as_slice()),
            PoolEvent::V4ModifyLiquidity(event) => hex_encode(event.id.as_slice()),
            _ => log.address.clone(),
        }
    }
}

fn decode_event<E: SolEvent>(log: &LogEntry, data: &LogData) -> Result<E, EngineError> {
    E::decode_log_data(data).map_err(|e| EngineError::DecodeAnomaly {
        block: log.block_number,
        log_index: log.log_index,
        reason: e.to_string(),
    })
}

/// Decode a log into a pool mutation, or `None` for irrelevant topics.
pub fn decode(log: &LogEntry) -> Result<Option<PoolEvent>, EngineError> {
    let Some(topic0) = log.topic0() else {
        return Ok(None);
    };
    let data = log.log_data();

    let event = match *topic0 {
        t if t == v2::Sync::SIGNATURE_HASH => PoolEvent::V2Sync(decode_event(log, &data)?),
        t if t == v2::Swap::SIGNATURE_HASH => PoolEvent::V2Swap(decode_event(log, &data)?),
        t if t == v2::Mint::SIGNATURE_HASH => PoolEvent::V2Mint(decode_event(log, &data)?),
        t if t == v2::Burn::SIGNATURE_HASH => PoolEvent::V2Burn(decode_event(log, &data)?),
        t if t == v3::Initialize::SIGNATURE_HASH => {
            PoolEvent::V3Initialize(decode_event(log, &data)?)
        },
        t if t == v3::Swap::SIGNATURE_HASH => PoolEvent::V3Swap(decode_event(log, &data)?),
        t if t == v3::Mint::SIGNATURE_HASH => PoolEvent::V3Mint(decode_event(log, &data)?),
        t if t == v3::Burn::SIGNATURE_HASH => PoolEvent::V3Burn(decode_event(log, &data)?),
        t if t == v4::Swap::SIGNATURE_HASH => PoolEvent::V4Swap(decode_event(log, &data)?),
        t if t == v4::ModifyLiquidity::SIGNATURE_HASH => {
            PoolEvent::V4ModifyLiquidity(decode_event(log, &data)?)
        },
        _ => return Ok(None),
    };

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, B256, U256};

    fn log_from(data: LogData, address: &str) -> LogEntry {
        LogEntry {
            address: address.to_string(),
            topics: data.topics().to_vec(),
            data: data.data,
            block_number: 100,
            log_index: 3,
            tx_hash: "0xabc".to_string(),
        }
    }

    #[test]
    fn decodes_v2_sync() {
        let event = v2::Sync {
            reserve0: alloy::primitives::Uint::from(500u64),
            reserve1: alloy::primitives::Uint::from(7u64),
        };
        let log = log_from(event.encode_log_data(), "0xpool");
        let decoded = decode(&log).unwrap().unwrap();
        match &decoded {
            PoolEvent::V2Sync(sync) => {
                assert_eq!(U256::from(sync.reserve0), U256::from(500u64));
            },
            _ => panic!("expected V2Sync"),
        }
        assert_eq!(decoded.pool_key(&log), "0xpool");
    }

    #[test]
    fn v4_events_key_by_pool_id() {
        let id = B256::repeat_byte(0x77);
        let event = v4::ModifyLiquidity {
            id,
            sender: Address::ZERO,
            tickLower: alloy::primitives::Signed::ZERO,
            tickUpper: alloy::primitives::Signed::ZERO,
            liquidityDelta: alloy::primitives::I256::try_from(100).unwrap(),
            salt: B256::ZERO,
        };
        let log = log_from(event.encode_log_data(), "0xmanager");
        let decoded = decode(&log).unwrap().unwrap();
        assert_eq!(decoded.pool_key(&log), hex_encode(id.as_slice()));
    }

    #[test]
    fn unknown_topic_is_not_an_error() {
        let log = LogEntry {
            address: "0xpool".to_string(),
            topics: vec![B256::repeat_byte(0xab)],
            data: Bytes::new(),
            block_number: 100,
            log_index: 0,
            tx_hash: "0xabc".to_string(),
        };
        assert!(decode(&log).unwrap().is_none());
    }

    #[test]
    fn known_topic_with_truncated_payload_is_an_anomaly() {
        let event = v2::Sync {
            reserve0: alloy::primitives::Uint::from(1u64),
            reserve1: alloy::primitives::Uint::from(1u64),
        };
        let mut log = log_from(event.encode_log_data(), "0xpool");
        log.data = Bytes::from(vec![0u8; 5]);
        match decode(&log) {
            Err(EngineError::DecodeAnomaly { block, log_index, .. }) => {
                assert_eq!(block, 100);
                assert_eq!(log_index, 3);
            },
            _ => panic!("expected decode anomaly"),
        }
    }
}
