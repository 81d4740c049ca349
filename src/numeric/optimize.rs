//! Bounded scalar minimisation
//!
//! Brent's method restricted to a closed interval: golden-section steps,
//! accelerated by parabolic interpolation whenever the parabola through the
//! last three points is trustworthy.

use serde::{Deserialize, Serialize};

/// (3 - sqrt(5)) / 2
const GOLDEN: f64 = 0.381_966_011_250_105_1;

/// Best point found by `minimize_bounded`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
    /// False when the evaluation budget ran out before the bracket shrank to `x_tolerance`
    pub converged: bool,
}

/// Minimise `f` on `[lower, upper]`, stopping once the bracket around the
/// minimum is narrower than roughly `x_tolerance` or after `max_evaluations`
/// calls of `f`.
pub fn minimize_bounded<F: FnMut(f64) -> f64>(
    mut f: F,
    lower: f64,
    upper: f64,
    x_tolerance: f64,
    max_evaluations: usize,
) -> Minimum {
    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lower, upper);

    let mut fulc = a + GOLDEN * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat = 0.0;
    let mut e: f64 = 0.0;
    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;

    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + x_tolerance / 3.0;
    let mut tol2 = 2.0 * tol1;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            // Parabola through (xf, fx), (nfc, fnfc), (fulc, ffulc)
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                golden = false;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign(xm - xf);
                }
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = GOLDEN * e;
        }

        let x = xf + sign(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + x_tolerance / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_evaluations {
            return Minimum {
                x: xf,
                value: fx,
                evaluations,
                converged: false,
            };
        }
    }

    Minimum {
        x: xf,
        value: fx,
        evaluations,
        converged: true,
    }
}

fn sign(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}
