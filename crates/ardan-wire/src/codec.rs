//! Packet encode/decode.
//!
//! All integers and floats are little-endian. Decoding works on a borrowed
//! slice and never allocates beyond the returned envelope.

use ardan_core::{Command, DecodeError, EntityId, PacketEnvelope, Rgb, StateFields, StateUpdate};

use crate::{
    mask, HEADER_LEN, MAX_DATAGRAM_SIZE, TAG_SET_INDICATOR, TAG_STATE_UPDATE, TAG_TRIGGER_EVENT,
};

// ── Bounded slice reader ────────────────────────────────────────

/// Sequential reader over a body slice. Every read is bounds-checked.
struct BodyReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BodyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let slice = self
            .data
            .get(self.offset..end)
            .ok_or_else(|| DecodeError::Malformed {
                detail: format!("truncated {what}: need {N} bytes at offset {}", self.offset),
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.offset = end;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, DecodeError> {
        Ok(self.take::<1>(what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take::<4>(what)?))
    }

    fn f64(&mut self, what: &str) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take::<8>(what)?))
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.offset != self.data.len() {
            return Err(DecodeError::Malformed {
                detail: format!(
                    "{} unexpected trailing body bytes",
                    self.data.len() - self.offset
                ),
            });
        }
        Ok(())
    }
}

// ── Decode ──────────────────────────────────────────────────────

/// Decode one datagram using the default [`MAX_DATAGRAM_SIZE`] bound.
pub fn decode(bytes: &[u8]) -> Result<PacketEnvelope, DecodeError> {
    decode_bounded(bytes, MAX_DATAGRAM_SIZE)
}

/// Decode one datagram, rejecting packets whose declared size exceeds
/// `max_datagram_size`.
///
/// Checks run in a fixed order: length prefix, declared size, tag, body
/// length against the bytes actually received, then the body itself.
pub fn decode_bounded(
    bytes: &[u8],
    max_datagram_size: usize,
) -> Result<PacketEnvelope, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::Malformed {
            detail: format!("truncated length prefix: got {} of 4 bytes", bytes.len()),
        });
    }
    let body_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let declared = HEADER_LEN.saturating_add(body_len);
    if declared > max_datagram_size || bytes.len() > max_datagram_size {
        return Err(DecodeError::SizeMismatch {
            declared: declared.max(bytes.len()),
            max: max_datagram_size,
        });
    }
    let tag = *bytes.get(4).ok_or_else(|| DecodeError::Malformed {
        detail: "missing type tag".into(),
    })?;
    if !matches!(tag, TAG_STATE_UPDATE | TAG_SET_INDICATOR | TAG_TRIGGER_EVENT) {
        return Err(DecodeError::UnknownType { tag });
    }

    let available = bytes.len() - HEADER_LEN;
    if body_len > available {
        return Err(DecodeError::Malformed {
            detail: format!("truncated body: declared {body_len} bytes, received {available}"),
        });
    }
    if body_len < available {
        return Err(DecodeError::Malformed {
            detail: format!(
                "{} trailing bytes after declared body",
                available - body_len
            ),
        });
    }

    let mut body = BodyReader::new(&bytes[HEADER_LEN..]);
    let envelope = match tag {
        TAG_STATE_UPDATE => decode_state_update(&mut body)?,
        TAG_SET_INDICATOR => {
            let entity = EntityId(body.u32("entity id")?);
            let on = match body.u8("indicator flag")? {
                0 => false,
                1 => true,
                flag => {
                    return Err(DecodeError::Malformed {
                        detail: format!("invalid indicator flag: {flag}"),
                    })
                }
            };
            PacketEnvelope::Command(Command::SetIndicator { entity, on })
        }
        _ => PacketEnvelope::Command(Command::TriggerEvent {
            entity: EntityId(body.u32("entity id")?),
        }),
    };
    body.finish()?;
    Ok(envelope)
}

/// Body size implied by a presence mask: id + mask + present fields.
fn state_body_len(m: u8) -> usize {
    let floats = (m & !mask::COLOR).count_ones() as usize;
    let color = if m & mask::COLOR != 0 { 3 } else { 0 };
    5 + color + floats * 8
}

fn decode_state_update(body: &mut BodyReader<'_>) -> Result<PacketEnvelope, DecodeError> {
    let entity = EntityId(body.u32("entity id")?);
    let m = body.u8("field mask")?;
    if m & !mask::ALL != 0 {
        return Err(DecodeError::Malformed {
            detail: format!("undefined field mask bits: {:#04x}", m & !mask::ALL),
        });
    }
    if body.data.len() != state_body_len(m) {
        return Err(DecodeError::Malformed {
            detail: format!(
                "state body is {} bytes, mask {m:#04x} requires {}",
                body.data.len(),
                state_body_len(m)
            ),
        });
    }

    let mut fields = StateFields::default();
    if m & mask::COLOR != 0 {
        let [r, g, b] = body.take::<3>("colour")?;
        fields.color = Some(Rgb::new(r, g, b));
    }
    if m & mask::RADIO_DUTY != 0 {
        fields.radio_duty = Some(body.f64("radio duty")?);
    }
    if m & mask::RADIO_TX != 0 {
        fields.radio_tx_ratio = Some(body.f64("tx ratio")?);
    }
    if m & mask::RADIO_RX != 0 {
        fields.radio_rx_ratio = Some(body.f64("rx ratio")?);
    }
    if m & mask::RADIO_IX != 0 {
        fields.radio_ix_ratio = Some(body.f64("ix ratio")?);
    }
    if m & mask::TIMESTAMP != 0 {
        fields.timestamp = Some(body.f64("timestamp")?);
    }
    Ok(PacketEnvelope::StateUpdate(StateUpdate { entity, fields }))
}

// ── Encode ──────────────────────────────────────────────────────

fn field_mask(fields: &StateFields) -> u8 {
    let mut m = 0;
    if fields.color.is_some() {
        m |= mask::COLOR;
    }
    if fields.radio_duty.is_some() {
        m |= mask::RADIO_DUTY;
    }
    if fields.radio_tx_ratio.is_some() {
        m |= mask::RADIO_TX;
    }
    if fields.radio_rx_ratio.is_some() {
        m |= mask::RADIO_RX;
    }
    if fields.radio_ix_ratio.is_some() {
        m |= mask::RADIO_IX;
    }
    if fields.timestamp.is_some() {
        m |= mask::TIMESTAMP;
    }
    m
}

/// Total encoded size of `envelope`, header included.
pub fn encoded_len(envelope: &PacketEnvelope) -> usize {
    HEADER_LEN
        + match envelope {
            PacketEnvelope::StateUpdate(update) => state_body_len(field_mask(&update.fields)),
            PacketEnvelope::Command(Command::SetIndicator { .. }) => 5,
            PacketEnvelope::Command(Command::TriggerEvent { .. }) => 4,
        }
}

/// Encode `envelope` into a fresh buffer.
pub fn encode(envelope: &PacketEnvelope) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(envelope));
    encode_into(envelope, &mut buf);
    buf
}

/// Append the encoding of `envelope` to `buf`.
pub fn encode_into(envelope: &PacketEnvelope, buf: &mut Vec<u8>) {
    let body_len = (encoded_len(envelope) - HEADER_LEN) as u32;
    buf.extend_from_slice(&body_len.to_le_bytes());
    match envelope {
        PacketEnvelope::StateUpdate(update) => {
            let f = &update.fields;
            buf.push(TAG_STATE_UPDATE);
            buf.extend_from_slice(&update.entity.0.to_le_bytes());
            buf.push(field_mask(f));
            if let Some(c) = f.color {
                buf.extend_from_slice(&[c.r, c.g, c.b]);
            }
            for v in [
                f.radio_duty,
                f.radio_tx_ratio,
                f.radio_rx_ratio,
                f.radio_ix_ratio,
                f.timestamp,
            ]
            .into_iter()
            .flatten()
            {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        PacketEnvelope::Command(Command::SetIndicator { entity, on }) => {
            buf.push(TAG_SET_INDICATOR);
            buf.extend_from_slice(&entity.0.to_le_bytes());
            buf.push(u8::from(*on));
        }
        PacketEnvelope::Command(Command::TriggerEvent { entity }) => {
            buf.push(TAG_TRIGGER_EVENT);
            buf.extend_from_slice(&entity.0.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_update() -> PacketEnvelope {
        PacketEnvelope::StateUpdate(StateUpdate {
            entity: EntityId(42),
            fields: StateFields {
                color: Some(Rgb::new(1, 2, 3)),
                radio_duty: Some(0.5),
                radio_tx_ratio: Some(0.25),
                radio_rx_ratio: Some(0.125),
                radio_ix_ratio: Some(0.0625),
                timestamp: Some(12.5),
            },
        })
    }

    #[test]
    fn full_state_update_layout() {
        let bytes = encode(&full_update());
        assert_eq!(bytes.len(), HEADER_LEN + 5 + 3 + 5 * 8);
        assert_eq!(&bytes[0..4], &48u32.to_le_bytes());
        assert_eq!(bytes[4], TAG_STATE_UPDATE);
        assert_eq!(&bytes[5..9], &42u32.to_le_bytes());
        assert_eq!(bytes[9], mask::ALL);
        assert_eq!(&bytes[10..13], &[1, 2, 3]);
    }

    #[test]
    fn partial_state_update_omits_absent_fields() {
        let env = PacketEnvelope::StateUpdate(StateUpdate {
            entity: EntityId(1),
            fields: StateFields {
                radio_rx_ratio: Some(0.75),
                ..StateFields::default()
            },
        });
        let bytes = encode(&env);
        assert_eq!(bytes.len(), HEADER_LEN + 5 + 8);
        assert_eq!(bytes[9], mask::RADIO_RX);
        assert_eq!(decode(&bytes).unwrap(), env);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&full_update()), encode(&full_update()));
    }

    #[test]
    fn commands_decode() {
        let on = PacketEnvelope::Command(Command::SetIndicator {
            entity: EntityId(5),
            on: true,
        });
        let fire = PacketEnvelope::Command(Command::TriggerEvent {
            entity: EntityId(6),
        });
        assert_eq!(decode(&encode(&on)).unwrap(), on);
        assert_eq!(decode(&encode(&fire)).unwrap(), fire);
        assert_eq!(encode(&fire).len(), encoded_len(&fire));
    }

    #[test]
    fn short_buffer_is_malformed() {
        assert!(matches!(decode(&[]), Err(DecodeError::Malformed { .. })));
        assert!(matches!(decode(&[4, 0, 0]), Err(DecodeError::Malformed { .. })));
        assert!(matches!(
            decode(&[4, 0, 0, 0]),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_reported_before_body() {
        // Body is truncated too, but the tag is checked first.
        let bytes = [10, 0, 0, 0, 0xEE, 1];
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownType { tag: 0xEE }));
    }

    #[test]
    fn oversized_declaration_is_size_mismatch() {
        let mut bytes = (MAX_DATAGRAM_SIZE as u32).to_le_bytes().to_vec();
        bytes.push(TAG_STATE_UPDATE);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::SizeMismatch { max, .. }) if max == MAX_DATAGRAM_SIZE
        ));

        let huge = u32::MAX.to_le_bytes();
        assert!(matches!(
            decode(&[huge[0], huge[1], huge[2], huge[3], TAG_TRIGGER_EVENT]),
            Err(DecodeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn custom_bound_is_honoured() {
        let bytes = encode(&full_update());
        assert!(decode_bounded(&bytes, bytes.len()).is_ok());
        assert!(matches!(
            decode_bounded(&bytes, bytes.len() - 1),
            Err(DecodeError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn truncated_body_is_malformed() {
        let bytes = encode(&full_update());
        for cut in HEADER_LEN..bytes.len() {
            assert!(
                matches!(decode(&bytes[..cut]), Err(DecodeError::Malformed { .. })),
                "cut at {cut} should be malformed"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut bytes = encode(&full_update());
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn mask_and_length_must_agree() {
        let mut bytes = encode(&full_update());
        // Claim only colour is present while carrying every field.
        bytes[9] = mask::COLOR;
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed { .. })));

        let mut bytes = encode(&full_update());
        bytes[9] |= 0x80;
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed { .. })));
    }

    #[test]
    fn invalid_indicator_flag_is_malformed() {
        let mut bytes = encode(&PacketEnvelope::Command(Command::SetIndicator {
            entity: EntityId(1),
            on: false,
        }));
        bytes[9] = 2;
        assert!(matches!(decode(&bytes), Err(DecodeError::Malformed { .. })));
    }
}
