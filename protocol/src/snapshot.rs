//! Frozen form of a suspended session, used to rehydrate it later (possibly in another process).

use crate::{
    congestion::CongestionControlKind,
    errors::{ProtocolError, ProtocolResult},
    state::ConnectionState,
};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use crc::crc32;
use lazy_static::lazy_static;
use std::io::Cursor;

const SNAPSHOT_VERSION: u8 = 1;
const BODY_LEN: usize = 8;
pub const SNAPSHOT_LEN: usize = BODY_LEN + 4;

const FLAG_INITIALIZATION_PHASE: u8 = 0x01;

lazy_static! {
    static ref PROTOCOL_VERSION: String = format!(
        "{}-{}.{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR")
    );
}

/// What a suspended session needs to pick up where it left off.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub congestion_control: Option<CongestionControlKind>,
    pub transmit_rate_limit: u32,
    pub initialization_phase: bool,
}

impl SessionSnapshot {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(SNAPSHOT_LEN);
        buf.put_u8(SNAPSHOT_VERSION);
        buf.put_u8(ConnectionState::Suspended as u8);
        buf.put_u8(CongestionControlKind::code(self.congestion_control));
        buf.put_u8(if self.initialization_phase {
            FLAG_INITIALIZATION_PHASE
        } else {
            0
        });
        buf.put_u32_be(self.transmit_rate_limit);
        let checksum = calc_checksum(&buf[..BODY_LEN]);
        buf.put_u32_be(checksum);
        buf.freeze()
    }

    pub fn decode(snapshot: &[u8]) -> ProtocolResult<Self> {
        let mut cursor = Cursor::new(snapshot);

        let version = cursor.read_u8()?;
        if version != SNAPSHOT_VERSION {
            return Err(ProtocolError::UnsupportedSnapshotVersion(version));
        }
        if snapshot.len() != SNAPSHOT_LEN {
            return Err(ProtocolError::CorruptSnapshot("unexpected length"));
        }

        let state = cursor.read_u8()?;
        let congestion_control = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let transmit_rate_limit = cursor.read_u32::<BigEndian>()?;
        let checksum = cursor.read_u32::<BigEndian>()?;

        if checksum != calc_checksum(&snapshot[..BODY_LEN]) {
            return Err(ProtocolError::ChecksumMismatch);
        }
        if ConnectionState::from_u8(state) != Some(ConnectionState::Suspended) {
            return Err(ProtocolError::CorruptSnapshot("session was not suspended"));
        }
        let congestion_control = CongestionControlKind::from_code(congestion_control)
            .ok_or(ProtocolError::CorruptSnapshot("unknown congestion control"))?;
        if flags & !FLAG_INITIALIZATION_PHASE != 0 {
            return Err(ProtocolError::CorruptSnapshot("unknown flags"));
        }

        Ok(Self {
            congestion_control,
            transmit_rate_limit,
            initialization_phase: flags & FLAG_INITIALIZATION_PHASE != 0,
        })
    }
}

fn calc_checksum(payload: &[u8]) -> u32 {
    crc32::checksum_ieee(&[PROTOCOL_VERSION.as_bytes(), payload].concat())
}

#[cfg(test)]
mod test {
    use super::{
        calc_checksum, CongestionControlKind, ProtocolError, SessionSnapshot, BODY_LEN,
        SNAPSHOT_LEN,
    };
    use byteorder::{BigEndian, WriteBytesExt};

    // Encodes the snapshot, lets `tamper` edit the body, then recomputes the checksum.
    fn resigned(tamper: impl FnOnce(&mut [u8])) -> Vec<u8> {
        let mut bytes = snapshot().encode()[..BODY_LEN].to_vec();
        tamper(&mut bytes);
        let checksum = calc_checksum(&bytes);
        bytes.write_u32::<BigEndian>(checksum).unwrap();
        bytes
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            congestion_control: Some(CongestionControlKind::RateModulation),
            transmit_rate_limit: 123_456,
            initialization_phase: false,
        }
    }

    #[test]
    fn encoded_layout() {
        let bytes = snapshot().encode();
        assert_eq!(bytes.len(), SNAPSHOT_LEN);
        assert_eq!(&bytes[..8], &[1, 10, 1, 0, 0x00, 0x01, 0xE2, 0x40]);
    }

    #[test]
    fn decode_restores_the_snapshot() {
        let original = SessionSnapshot {
            congestion_control: None,
            transmit_rate_limit: 0,
            initialization_phase: true,
        };
        assert_eq!(SessionSnapshot::decode(&original.encode()), Ok(original));
    }

    #[test]
    fn flipped_bit_fails_the_checksum() {
        let mut bytes = snapshot().encode().to_vec();
        bytes[5] ^= 0x10;
        assert_eq!(
            SessionSnapshot::decode(&bytes).unwrap_err(),
            ProtocolError::ChecksumMismatch
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = snapshot().encode().to_vec();
        bytes[0] = 9;
        assert_eq!(
            SessionSnapshot::decode(&bytes).unwrap_err(),
            ProtocolError::UnsupportedSnapshotVersion(9)
        );
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let bytes = snapshot().encode();
        assert!(SessionSnapshot::decode(&bytes[..6]).is_err());
        assert_eq!(
            SessionSnapshot::decode(&[]).unwrap_err(),
            ProtocolError::IOError(std::io::ErrorKind::UnexpectedEof.into())
        );
    }

    #[test]
    fn resigned_body_without_changes_decodes() {
        assert_eq!(SessionSnapshot::decode(&resigned(|_| {})), Ok(snapshot()));
    }

    #[test]
    fn session_that_was_not_suspended_is_rejected() {
        // ESTABLISHED
        let bytes = resigned(|body| body[1] = 3);
        assert_eq!(
            SessionSnapshot::decode(&bytes).unwrap_err(),
            ProtocolError::CorruptSnapshot("session was not suspended")
        );
        let bytes = resigned(|body| body[1] = 200);
        assert!(SessionSnapshot::decode(&bytes).is_err());
    }

    #[test]
    fn unknown_congestion_control_code_is_rejected() {
        let bytes = resigned(|body| body[2] = 3);
        match SessionSnapshot::decode(&bytes) {
            Err(ProtocolError::CorruptSnapshot(reason)) => {
                assert_eq!(reason, "unknown congestion control")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let bytes = resigned(|body| body[3] = 0x02);
        match SessionSnapshot::decode(&bytes) {
            Err(ProtocolError::CorruptSnapshot(reason)) => assert_eq!(reason, "unknown flags"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
