//! Deterministic per-date shuffling of time lists.
//!
//! The same date always yields the same order, on every run and every
//! platform: a xorshift32 generator is seeded from the calendar date and
//! drives a Fisher–Yates pass over the list.

use chrono::{Datelike, NaiveDate};

/// 32-bit xorshift generator (shifts 13, 17, 5)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Creates a generator from `seed`
    ///
    /// A zero seed makes the generator emit zeros forever; callers get
    /// exactly that, no substitution happens here.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance and return the next 32-bit value
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Advance and return the next value scaled into `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Index in `0..=bound` for the current Fisher–Yates step
    ///
    /// Computes `floor(v / 2^32 * (bound + 1))` in integers.
    fn next_index(&mut self, bound: usize) -> usize {
        let span = u64::try_from(bound).unwrap_or(u64::MAX).saturating_add(1);
        let scaled = (u64::from(self.next_u32()) * span) >> 32;
        usize::try_from(scaled).unwrap_or(bound).min(bound)
    }
}

/// Seed for a date: `year * 10000 + month * 100 + day`, reduced modulo 2^32
#[must_use]
pub fn date_seed(date: NaiveDate) -> u32 {
    let packed = i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day());
    u32::try_from(packed.rem_euclid(1 << 32)).unwrap_or_default()
}

/// Shuffle `times` in place into the order assigned to `date`
///
/// Walks `i` from the last index down to 1, swapping with an index drawn
/// from `0..=i`. Lists with fewer than two entries are left untouched.
pub fn reorder_by_date<T>(times: &mut [T], date: NaiveDate) {
    let mut rng = XorShift32::new(date_seed(date));
    for i in (1..times.len()).rev() {
        let j = rng.next_index(i);
        times.swap(i, j);
    }
}

/// Owned variant of [`reorder_by_date`]
#[must_use]
pub fn reordered<T>(mut times: Vec<T>, date: NaiveDate) -> Vec<T> {
    reorder_by_date(&mut times, date);
    times
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{slots, TimeSlot};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    fn six() -> Vec<TimeSlot> {
        slots(["17:00", "18:00", "19:00", "20:00", "21:00", "22:00"])
    }

    #[test]
    fn seed_packs_calendar_fields() {
        assert_eq!(date_seed(date(2025, 10, 20)), 20_251_020);
        assert_eq!(date_seed(date(2030, 1, 1)), 20_300_101);
    }

    #[test]
    fn xorshift_sequence_is_stable() {
        let mut rng = XorShift32::new(20_251_020);
        assert_eq!(rng.next_u32(), 2_174_677_198);
        assert_eq!(rng.next_u32(), 2_942_631_597);
        assert_eq!(rng.next_u32(), 647_600_213);
    }

    #[test]
    fn zero_seed_stays_zero() {
        let mut rng = XorShift32::new(0);
        assert_eq!(rng.next_u32(), 0);
        assert!(rng.next_f64().abs() < f64::EPSILON);
    }

    #[test]
    fn next_f64_is_in_unit_interval() {
        let mut rng = XorShift32::new(date_seed(date(2026, 10, 19)));
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn golden_orders_for_six_slots() {
        let cases = [
            (date(2025, 10, 20), ["19:00", "21:00", "18:00", "17:00", "22:00", "20:00"]),
            (date(2025, 10, 21), ["17:00", "18:00", "21:00", "19:00", "22:00", "20:00"]),
            (date(2026, 10, 19), ["19:00", "18:00", "22:00", "21:00", "20:00", "17:00"]),
            (date(2026, 10, 20), ["18:00", "21:00", "19:00", "22:00", "20:00", "17:00"]),
            (date(2030, 1, 1), ["21:00", "22:00", "17:00", "18:00", "19:00", "20:00"]),
        ];

        for (day, expected) in cases {
            assert_eq!(reordered(six(), day), slots(expected), "order for {day}");
        }
    }

    #[test]
    fn golden_orders_for_three_slots() {
        let three = || slots(["17:00", "18:00", "19:00"]);

        assert_eq!(reordered(three(), date(2025, 10, 20)), slots(["17:00", "19:00", "18:00"]));
        assert_eq!(reordered(three(), date(2030, 1, 1)), slots(["17:00", "19:00", "18:00"]));
        assert_eq!(reordered(three(), date(2026, 10, 19)), slots(["19:00", "18:00", "17:00"]));
    }

    #[test]
    fn short_lists_are_untouched() {
        let mut empty: Vec<TimeSlot> = Vec::new();
        reorder_by_date(&mut empty, date(2025, 10, 20));
        assert!(empty.is_empty());

        assert_eq!(reordered(slots(["17:00"]), date(2025, 10, 20)), slots(["17:00"]));
    }

    #[test]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn integer_index_matches_float_formula() {
        let mut ints = XorShift32::new(date_seed(date(2025, 10, 20)));
        let mut floats = XorShift32::new(date_seed(date(2025, 10, 20)));
        for bound in (1..64usize).rev() {
            let expected = (floats.next_f64() * (bound as f64 + 1.0)).floor() as usize;
            assert_eq!(ints.next_index(bound), expected);
        }
    }
}
