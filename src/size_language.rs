//! The size-language: a set of negative-integer sentinels that let a block's
//! width/height/min/max/content dimensions reference a sibling's or the
//! surface's own dimensions instead of a literal pixel count.
//!
//! The wire format only fixes `AUTO = 0` and "non-negative = literal pixels";
//! the concrete negative bands are an implementation choice documented here
//! (see DESIGN.md's resolution of the corresponding open question). Every
//! basis/op pair gets its own disjoint million-wide band of negative
//! integers, so decoding is unambiguous and round-trips exactly.

/// What a `Ref` value is measured relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    SurfaceWidth,
    SurfaceHeight,
    OutputWidth,
    OutputHeight,
    PrevBlockWidth,
    PrevBlockHeight,
    PrevContentWidth,
    PrevContentHeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeValue {
    Auto,
    Absolute(u32),
    Ref { basis: Basis, op: Op, delta: u32 },
}

const BAND: i64 = 1_000_000;

fn zone_of(basis: Basis, op: Op) -> i64 {
    let basis_index = match basis {
        Basis::SurfaceWidth => 0,
        Basis::SurfaceHeight => 1,
        Basis::OutputWidth => 2,
        Basis::OutputHeight => 3,
        Basis::PrevBlockWidth => 4,
        Basis::PrevBlockHeight => 5,
        Basis::PrevContentWidth => 6,
        Basis::PrevContentHeight => 7,
    };
    basis_index * 2 + if op == Op::Plus { 0 } else { 1 }
}

fn basis_of_zone(zone: i64) -> Option<Basis> {
    Some(match zone / 2 {
        0 => Basis::SurfaceWidth,
        1 => Basis::SurfaceHeight,
        2 => Basis::OutputWidth,
        3 => Basis::OutputHeight,
        4 => Basis::PrevBlockWidth,
        5 => Basis::PrevBlockHeight,
        6 => Basis::PrevContentWidth,
        7 => Basis::PrevContentHeight,
        _ => return None,
    })
}

impl SizeValue {
    /// Encode `basis op delta` as its wire sentinel.
    pub fn encode(basis: Basis, op: Op, delta: u32) -> i64 {
        -(zone_of(basis, op) * BAND + delta as i64 + 1)
    }

    /// The single place that interprets the sentinel ranges, per spec.
    pub fn decode(v: i64) -> SizeValue {
        if v == 0 {
            return SizeValue::Auto;
        }
        if v > 0 {
            return SizeValue::Absolute(v as u32);
        }
        let m = -v - 1;
        let zone = m / BAND;
        let delta = (m % BAND) as u32;
        match basis_of_zone(zone) {
            Some(basis) => SizeValue::Ref {
                basis,
                op: if zone % 2 == 0 { Op::Plus } else { Op::Minus },
                delta,
            },
            // Unknown/out-of-range negative sentinel: treat like missing.
            None => SizeValue::Auto,
        }
    }
}

/// The resolved values a `Ref` may draw on for one block, as known at the
/// point it is evaluated. `None` means "not available in this context"
/// (e.g. no previous sibling, or evaluating inside a composite where
/// `surface*`/`output*` are unbound) and resolves to `0`, per spec §4.E.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeContext {
    pub surface_width: Option<i32>,
    pub surface_height: Option<i32>,
    pub output_width: Option<i32>,
    pub output_height: Option<i32>,
    pub prev_block_width: Option<i32>,
    pub prev_block_height: Option<i32>,
    pub prev_content_width: Option<i32>,
    pub prev_content_height: Option<i32>,
}

impl SizeContext {
    fn basis_value(&self, basis: Basis) -> Option<i32> {
        match basis {
            Basis::SurfaceWidth => self.surface_width,
            Basis::SurfaceHeight => self.surface_height,
            Basis::OutputWidth => self.output_width,
            Basis::OutputHeight => self.output_height,
            Basis::PrevBlockWidth => self.prev_block_width,
            Basis::PrevBlockHeight => self.prev_block_height,
            Basis::PrevContentWidth => self.prev_content_width,
            Basis::PrevContentHeight => self.prev_content_height,
        }
    }
}

impl SizeValue {
    /// Resolve to a concrete pixel count in `ctx`. `Auto` and an
    /// unavailable basis both yield `0` — the caller is responsible for
    /// substituting the image/content-specific Auto default before calling
    /// this (spec §4.E: "`contentWidth/Height = Auto` for an image block
    /// defaults to the natural bitmap dimensions").
    pub fn resolve(self, ctx: &SizeContext) -> i32 {
        match self {
            SizeValue::Auto => 0,
            SizeValue::Absolute(n) => n as i32,
            SizeValue::Ref { basis, op, delta } => {
                let base = ctx.basis_value(basis).unwrap_or(0);
                match op {
                    Op::Plus => base + delta as i32,
                    Op::Minus => base - delta as i32,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_decodes_to_auto() {
        assert_eq!(SizeValue::decode(0), SizeValue::Auto);
    }

    #[test]
    fn positive_is_absolute() {
        assert_eq!(SizeValue::decode(42), SizeValue::Absolute(42));
    }

    #[test]
    fn every_basis_op_pair_round_trips() {
        let bases = [
            Basis::SurfaceWidth,
            Basis::SurfaceHeight,
            Basis::OutputWidth,
            Basis::OutputHeight,
            Basis::PrevBlockWidth,
            Basis::PrevBlockHeight,
            Basis::PrevContentWidth,
            Basis::PrevContentHeight,
        ];
        for &basis in &bases {
            for &op in &[Op::Plus, Op::Minus] {
                for &delta in &[0u32, 1, 5, 999_999] {
                    let wire = SizeValue::encode(basis, op, delta);
                    assert!(wire < 0);
                    let decoded = SizeValue::decode(wire);
                    match decoded {
                        SizeValue::Ref {
                            basis: b2,
                            op: o2,
                            delta: d2,
                        } => {
                            assert_eq!(b2, basis);
                            assert_eq!(o2, op);
                            assert_eq!(d2, delta);
                        }
                        other => panic!("expected Ref, got {other:?}"),
                    }
                }
            }
        }
    }

    #[test]
    fn prev_block_width_plus_resolves() {
        // S5 from spec: min_width = PREV_BLOCK_W_PLUS(5) against a 100-wide
        // previous block should resolve to 105.
        let wire = SizeValue::encode(Basis::PrevBlockWidth, Op::Plus, 5);
        let v = SizeValue::decode(wire);
        let ctx = SizeContext {
            prev_block_width: Some(100),
            ..Default::default()
        };
        assert_eq!(v.resolve(&ctx), 105);
    }

    #[test]
    fn prev_content_width_minus_zero_resolves_to_prev_content_width() {
        let wire = SizeValue::encode(Basis::PrevContentWidth, Op::Minus, 0);
        let v = SizeValue::decode(wire);
        let ctx = SizeContext {
            prev_content_width: Some(100),
            ..Default::default()
        };
        assert_eq!(v.resolve(&ctx), 100);
    }

    #[test]
    fn unavailable_basis_resolves_to_zero() {
        let wire = SizeValue::encode(Basis::PrevBlockWidth, Op::Plus, 5);
        let v = SizeValue::decode(wire);
        let ctx = SizeContext::default();
        assert_eq!(v.resolve(&ctx), 5);
    }
}
