//! Sensor state values.
//!
//! [`State`] is immutable once built: every "update" produces a new value
//! via [`State::with_fields`]. The mutable live cell an entity exposes to
//! the host is owned by the registry, never by recorded history.

/// An RGB indicator colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Build a colour from its three channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// One recorded (or live) reading of a sensor entity.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct State {
    /// Indicator colour.
    pub color: Rgb,
    /// Fraction of time the radio was powered.
    pub radio_duty: f64,
    /// Fraction of radio-on time spent transmitting.
    pub radio_tx_ratio: f64,
    /// Fraction of radio-on time spent receiving.
    pub radio_rx_ratio: f64,
    /// Fraction of radio-on time spent interfered.
    pub radio_ix_ratio: f64,
    /// Simulation time of the reading, in seconds.
    pub timestamp: f64,
}

impl State {
    /// Return a copy of `self` with every field present in `fields` replaced.
    pub fn with_fields(&self, fields: &StateFields) -> State {
        State {
            color: fields.color.unwrap_or(self.color),
            radio_duty: fields.radio_duty.unwrap_or(self.radio_duty),
            radio_tx_ratio: fields.radio_tx_ratio.unwrap_or(self.radio_tx_ratio),
            radio_rx_ratio: fields.radio_rx_ratio.unwrap_or(self.radio_rx_ratio),
            radio_ix_ratio: fields.radio_ix_ratio.unwrap_or(self.radio_ix_ratio),
            timestamp: fields.timestamp.unwrap_or(self.timestamp),
        }
    }

    /// Return a copy of `self` stamped with `timestamp`.
    pub fn at(&self, timestamp: f64) -> State {
        State { timestamp, ..*self }
    }

    /// Compare every field except `timestamp`.
    ///
    /// Floats are compared bit-for-bit so that a recorded value always
    /// equals the value it was recorded from, NaN included.
    pub fn same_reading(&self, other: &State) -> bool {
        self.color == other.color
            && self.radio_duty.to_bits() == other.radio_duty.to_bits()
            && self.radio_tx_ratio.to_bits() == other.radio_tx_ratio.to_bits()
            && self.radio_rx_ratio.to_bits() == other.radio_rx_ratio.to_bits()
            && self.radio_ix_ratio.to_bits() == other.radio_ix_ratio.to_bits()
    }

    /// Express this state as a full set of fields (every field present).
    pub fn to_fields(&self) -> StateFields {
        StateFields {
            color: Some(self.color),
            radio_duty: Some(self.radio_duty),
            radio_tx_ratio: Some(self.radio_tx_ratio),
            radio_rx_ratio: Some(self.radio_rx_ratio),
            radio_ix_ratio: Some(self.radio_ix_ratio),
            timestamp: Some(self.timestamp),
        }
    }
}

/// A partial state: only the fields a peer chose to send.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct StateFields {
    /// New indicator colour, if sent.
    pub color: Option<Rgb>,
    /// New radio duty cycle, if sent.
    pub radio_duty: Option<f64>,
    /// New transmit ratio, if sent.
    pub radio_tx_ratio: Option<f64>,
    /// New receive ratio, if sent.
    pub radio_rx_ratio: Option<f64>,
    /// New interference ratio, if sent.
    pub radio_ix_ratio: Option<f64>,
    /// Timestamp of the reading, if sent.
    pub timestamp: Option<f64>,
}

impl StateFields {
    /// True if no field is present.
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.radio_duty.is_none()
            && self.radio_tx_ratio.is_none()
            && self.radio_rx_ratio.is_none()
            && self.radio_ix_ratio.is_none()
            && self.timestamp.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> State {
        State {
            color: Rgb::new(255, 0, 0),
            radio_duty: 0.5,
            radio_tx_ratio: 0.1,
            radio_rx_ratio: 0.2,
            radio_ix_ratio: 0.3,
            timestamp: 1.0,
        }
    }

    #[test]
    fn with_fields_replaces_only_present_fields() {
        let fields = StateFields {
            radio_duty: Some(0.9),
            timestamp: Some(2.0),
            ..StateFields::default()
        };
        let next = base().with_fields(&fields);
        assert_eq!(next.radio_duty, 0.9);
        assert_eq!(next.timestamp, 2.0);
        assert_eq!(next.color, Rgb::new(255, 0, 0));
        assert_eq!(next.radio_rx_ratio, 0.2);
    }

    #[test]
    fn with_fields_leaves_original_untouched() {
        let original = base();
        let _ = original.with_fields(&StateFields {
            color: Some(Rgb::new(0, 0, 255)),
            ..StateFields::default()
        });
        assert_eq!(original, base());
    }

    #[test]
    fn same_reading_ignores_timestamp() {
        assert!(base().same_reading(&base().at(99.0)));
        let other = State {
            radio_ix_ratio: 0.31,
            ..base()
        };
        assert!(!base().same_reading(&other));
    }

    #[test]
    fn same_reading_treats_nan_as_equal_to_itself() {
        let a = State {
            radio_duty: f64::NAN,
            ..base()
        };
        assert!(a.same_reading(&a));
    }

    #[test]
    fn to_fields_round_trips_through_with_fields() {
        let s = base();
        assert_eq!(State::default().with_fields(&s.to_fields()), s);
        assert!(!s.to_fields().is_empty());
        assert!(StateFields::default().is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_state() -> impl Strategy<Value = State> {
            (any::<[u8; 3]>(), prop::array::uniform5(-1.0e6f64..1.0e6)).prop_map(|(c, v)| State {
                color: Rgb::new(c[0], c[1], c[2]),
                radio_duty: v[0],
                radio_tx_ratio: v[1],
                radio_rx_ratio: v[2],
                radio_ix_ratio: v[3],
                timestamp: v[4],
            })
        }

        proptest! {
            #[test]
            fn absent_fields_keep_their_old_value(
                old in arb_state(),
                new in arb_state(),
                mask in any::<[bool; 6]>(),
            ) {
                let full = new.to_fields();
                let partial = StateFields {
                    color: full.color.filter(|_| mask[0]),
                    radio_duty: full.radio_duty.filter(|_| mask[1]),
                    radio_tx_ratio: full.radio_tx_ratio.filter(|_| mask[2]),
                    radio_rx_ratio: full.radio_rx_ratio.filter(|_| mask[3]),
                    radio_ix_ratio: full.radio_ix_ratio.filter(|_| mask[4]),
                    timestamp: full.timestamp.filter(|_| mask[5]),
                };
                let merged = old.with_fields(&partial);
                prop_assert_eq!(merged.color, if mask[0] { new.color } else { old.color });
                prop_assert_eq!(merged.radio_duty, if mask[1] { new.radio_duty } else { old.radio_duty });
                prop_assert_eq!(merged.radio_ix_ratio, if mask[4] { new.radio_ix_ratio } else { old.radio_ix_ratio });
                prop_assert_eq!(merged.timestamp, if mask[5] { new.timestamp } else { old.timestamp });
                prop_assert_eq!(partial.is_empty(), !mask.iter().any(|&m| m));
            }
        }
    }
}
