//! Bracketed golden-section minimization of a one-dimensional function

/// Golden ratio conjugate
const R: f64 = 0.61803399;
const C: f64 = 1.0 - R;

/// Relative bracket tolerance
const TOL: f64 = 1e-6;

/// Absolute bracket tolerance, used when the bracket straddles zero
const FLOOR: f64 = 1e-12;

/// Result of a line search
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Minimum {
    /// Argument of the minimum
    pub x: f64,
    /// Function value at `x`
    pub f: f64,
}

/// Searches `[start - delta, start + delta]`, clamped to `[lower, upper]`,
/// for a minimum of `f`
///
/// The function is assumed to be unimodal over the bracket.  After the
/// bracket has collapsed, the nearer end of the original bracket is also
/// checked, so that a minimum lying on a bound is reported exactly.
///
/// `f` is evaluated at each sample point; callers are responsible for
/// restoring any state it changes.
pub fn minimize<F: FnMut(f64) -> f64>(
    mut f: F,
    start: f64,
    delta: f64,
    lower: f64,
    upper: f64,
) -> Minimum {
    let bx = start;
    let ax = (bx - delta - TOL).max(lower);
    let cx = (bx + delta + TOL).min(upper);

    let (mut x0, mut x3) = (ax, cx);
    let (mut x1, mut x2) = if (cx - bx).abs() > (bx - ax).abs() {
        (bx, bx + C * (cx - bx))
    } else {
        (bx - C * (bx - ax), bx)
    };
    let mut f1 = f(x1);
    let mut f2 = f(x2);

    while (x3 - x0).abs() > TOL * (x1.abs() + x2.abs()) + FLOOR {
        if f2 < f1 {
            x0 = x1;
            x1 = x2;
            x2 = R * x1 + C * x3;
            f1 = f2;
            f2 = f(x2);
        } else {
            x3 = x2;
            x2 = x1;
            x1 = R * x2 + C * x0;
            f2 = f1;
            f1 = f(x1);
        }
    }
    let best = if f1 < f2 {
        Minimum { x: x1, f: f1 }
    } else {
        Minimum { x: x2, f: f2 }
    };

    let end = if (best.x - ax).abs() < (cx - best.x).abs() {
        ax
    } else {
        cx
    };
    let fe = f(end);
    if fe <= best.f {
        Minimum { x: end, f: fe }
    } else {
        best
    }
}
