//! LTC (Linear Trend + Compression) line simplification. Peer component
//! (§1: "does not interact with CMF").
//!
//! Grounded on `examples/original_source/src/ltc.hpp`: a streaming swinging-
//! door variant that only transmits a point once the admissible trend cone
//! (`UL`/`LL`, upper/lower bounding lines through `epsilon`) would otherwise
//! be violated. The original recurses once on a forced transmit to replay the
//! current point against a synthetic transmit point; this port keeps that
//! single recursive call (the recursion is bounded at depth one, since the
//! replay always lands in the warmup branch and returns immediately).

#[derive(Debug, Clone, Copy, PartialEq)]
struct DataPoint {
    timestamp: f64,
    value: f64,
}

/// Streaming LTC compressor. `epsilon` is the half-width of the admissible
/// corridor; `min_value`/`max_value` clamp the bounding lines, matching the
/// original's `min_value`/`max_value` template parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ltc {
    epsilon: f64,
    min_value: f64,
    max_value: f64,
    time_unit: f64,
    counter: u8,
    last_transmit: DataPoint,
    ul: DataPoint,
    ll: DataPoint,
    new_ul: DataPoint,
    new_ll: DataPoint,
    to_transmit: Option<DataPoint>,
}

impl Ltc {
    pub fn new(epsilon: f64, min_value: f64, max_value: f64, time_unit: f64) -> Self {
        let zero = DataPoint {
            timestamp: 0.0,
            value: 0.0,
        };
        Ltc {
            epsilon,
            min_value,
            max_value,
            time_unit,
            counter: 0,
            last_transmit: zero,
            ul: zero,
            ll: zero,
            new_ul: zero,
            new_ll: zero,
            to_transmit: None,
        }
    }

    fn set_ul_and_ll(&mut self) {
        self.ul = self.new_ul;
        self.ll = self.new_ll;
    }

    fn update_cone(&mut self, timestamp: f64, value: f64) {
        self.new_ul = DataPoint {
            timestamp,
            value: (value + self.epsilon).min(self.max_value),
        };
        self.new_ll = DataPoint {
            timestamp,
            value: (value - self.epsilon).max(self.min_value),
        };
    }

    fn slope(&self, point: DataPoint) -> f64 {
        (point.value - self.last_transmit.value)
            / (point.timestamp - self.last_transmit.timestamp)
            / self.time_unit
    }

    fn need_transmit(&mut self) -> bool {
        let old_up = self.slope(self.ul);
        let old_low = self.slope(self.ll);
        let new_up = self.slope(self.new_ul);
        let new_low = self.slope(self.new_ll);

        if old_up < new_low || old_low > new_up {
            return true;
        }
        if old_up < new_up {
            self.new_ul.value =
                (self.new_ul.timestamp - self.ul.timestamp) / self.time_unit * old_up + self.ul.value;
        }
        if old_low > new_low {
            self.new_ll.value =
                (self.new_ll.timestamp - self.ll.timestamp) / self.time_unit * old_low + self.ll.value;
        }
        false
    }

    /// Offers one point to the compressor. Returns `true` when a point was
    /// emitted and is available via [`Ltc::value_to_transmit`].
    pub fn add(&mut self, timestamp: f64, value: f64) -> bool {
        if self.counter == 0 {
            self.last_transmit = DataPoint { timestamp, value };
            self.counter = 1;
            return false;
        }

        self.update_cone(timestamp, value);
        if self.counter == 1 {
            self.set_ul_and_ll();
            self.counter = 2;
            return false;
        }

        if !self.need_transmit() {
            self.set_ul_and_ll();
            return false;
        }

        self.to_transmit = Some(self.last_transmit);
        let midpoint = (self.ul.value + self.ll.value) / 2.0;
        self.last_transmit = DataPoint {
            timestamp: timestamp - 1.0,
            value: midpoint,
        };
        self.counter = 1;
        // Replay the current point against the synthetic transmit point, as
        // the original's single recursive `add` call does; its own return
        // value is discarded there too, only its state mutation matters.
        let _ = self.add(timestamp, value);
        true
    }

    pub fn value_to_transmit(&self) -> Option<(f64, f64)> {
        self.to_transmit.map(|p| (p.timestamp, p.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_signal_never_transmits_after_warmup() {
        let mut ltc = Ltc::new(0.5, -1000.0, 1000.0, 1.0);
        let mut transmitted = 0;
        for t in 0..50 {
            if ltc.add(t as f64, 10.0) {
                transmitted += 1;
            }
        }
        assert_eq!(transmitted, 0);
    }

    #[test]
    fn sharp_jump_forces_a_transmit() {
        let mut ltc = Ltc::new(0.5, -1000.0, 1000.0, 1.0);
        let mut transmitted = false;
        for t in 0..10 {
            if ltc.add(t as f64, 10.0) {
                transmitted = true;
            }
        }
        for t in 10..20 {
            if ltc.add(t as f64, 10.0 + (t as f64) * 50.0) {
                transmitted = true;
            }
        }
        assert!(transmitted);
    }
}
