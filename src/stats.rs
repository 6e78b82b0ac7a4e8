//! Elementwise and aggregate statistics over sample sequences.
//!
//! Every binary operation expects operands of the same length. A length mismatch is a programming
//! error and panics. Divisions by zero are not checked: they produce NaN or infinities, which
//! [`max_abs`] and [`argmax`] ignore.
use ndarray::{Array1, ArrayView1, ArrayViewMut1, Zip};

fn check_len(a: usize, b: usize) {
    assert_eq!(a, b, "operands must have the same length");
}

/// `out = a + b`
///
/// # Panics
/// Panic if the lengths of `a`, `b` and `out` differ.
pub fn add(a: ArrayView1<f64>, b: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    check_len(a.len(), b.len());
    check_len(a.len(), out.len());

    Zip::from(&mut out)
        .and(&a)
        .and(&b)
        .for_each(|o, &x, &y| *o = x + y);
}

/// `out = a - b`
///
/// # Panics
/// Panic if the lengths of `a`, `b` and `out` differ.
pub fn sub(a: ArrayView1<f64>, b: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    check_len(a.len(), b.len());
    check_len(a.len(), out.len());

    Zip::from(&mut out)
        .and(&a)
        .and(&b)
        .for_each(|o, &x, &y| *o = x - y);
}

/// `out = a * b`
///
/// # Panics
/// Panic if the lengths of `a`, `b` and `out` differ.
pub fn mul(a: ArrayView1<f64>, b: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    check_len(a.len(), b.len());
    check_len(a.len(), out.len());

    Zip::from(&mut out)
        .and(&a)
        .and(&b)
        .for_each(|o, &x, &y| *o = x * y);
}

/// `out = a / b`
///
/// # Panics
/// Panic if the lengths of `a`, `b` and `out` differ.
pub fn div(a: ArrayView1<f64>, b: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
    check_len(a.len(), b.len());
    check_len(a.len(), out.len());

    Zip::from(&mut out)
        .and(&a)
        .and(&b)
        .for_each(|o, &x, &y| *o = x / y);
}

/// `a += b`
///
/// # Panics
/// Panic if the lengths of `a` and `b` differ.
pub fn add_assign(mut a: ArrayViewMut1<f64>, b: ArrayView1<f64>) {
    check_len(a.len(), b.len());

    Zip::from(&mut a).and(&b).for_each(|x, &y| *x += y);
}

/// `a *= b`
///
/// # Panics
/// Panic if the lengths of `a` and `b` differ.
pub fn mul_assign(mut a: ArrayViewMut1<f64>, b: ArrayView1<f64>) {
    check_len(a.len(), b.len());

    Zip::from(&mut a).and(&b).for_each(|x, &y| *x *= y);
}

/// `a /= b`
///
/// # Panics
/// Panic if the lengths of `a` and `b` differ.
pub fn div_assign(mut a: ArrayViewMut1<f64>, b: ArrayView1<f64>) {
    check_len(a.len(), b.len());

    Zip::from(&mut a).and(&b).for_each(|x, &y| *x /= y);
}

/// Elementwise square root, in place.
pub fn sqrt_assign(mut a: ArrayViewMut1<f64>) {
    a.mapv_inplace(f64::sqrt);
}

/// Arithmetic mean of `a`. The mean of an empty sequence is NaN.
pub fn mean(a: ArrayView1<f64>) -> f64 {
    a.mean().unwrap_or(f64::NAN)
}

/// Return the mean of each column of the given rows.
///
/// # Panics
/// Panic if the rows do not all have length `num_samples`.
pub fn mean_columns<'a, I>(rows: I, num_samples: usize) -> Array1<f64>
where
    I: IntoIterator<Item = ArrayView1<'a, f64>>,
{
    let mut sum = Array1::zeros(num_samples);
    let mut count = 0usize;

    for row in rows {
        add_assign(sum.view_mut(), row);
        count += 1;
    }

    sum / count as f64
}

/// Return the largest absolute value among the finite elements of `a`.
///
/// The sign of a correlation does not matter to rank guesses, only its magnitude. Returns NaN if
/// `a` has no finite element, so that a fully degenerate sequence never wins an [`argmax`].
pub fn max_abs(a: ArrayView1<f64>) -> f64 {
    a.iter()
        .filter(|x| x.is_finite())
        .map(|x| x.abs())
        .fold(None, |max: Option<f64>, x| match max {
            Some(m) if m >= x => Some(m),
            _ => Some(x),
        })
        .unwrap_or(f64::NAN)
}

/// Return the index of the first maximum of `a`, ignoring non-finite elements.
///
/// Returns `None` if `a` has no finite element.
pub fn argmax(a: ArrayView1<f64>) -> Option<usize> {
    let mut idx_max: Option<usize> = None;

    for (i, &x) in a.iter().enumerate() {
        if !x.is_finite() {
            continue;
        }
        match idx_max {
            Some(j) if a[j] >= x => {}
            _ => idx_max = Some(i),
        }
    }

    idx_max
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    #[test]
    fn test_elementwise() {
        let a = array![1., 4., 9.];
        let b = array![2., 2., 3.];
        let mut out = Array1::zeros(3);

        add(a.view(), b.view(), out.view_mut());
        assert_eq!(out, array![3., 6., 12.]);
        sub(a.view(), b.view(), out.view_mut());
        assert_eq!(out, array![-1., 2., 6.]);
        mul(a.view(), b.view(), out.view_mut());
        assert_eq!(out, array![2., 8., 27.]);
        div(a.view(), b.view(), out.view_mut());
        assert_eq!(out, array![0.5, 2., 3.]);

        let mut c = a.clone();
        sqrt_assign(c.view_mut());
        assert_eq!(c, array![1., 2., 3.]);
        mul_assign(c.view_mut(), b.view());
        assert_eq!(c, array![2., 4., 9.]);
        div_assign(c.view_mut(), b.view());
        assert_eq!(c, array![1., 2., 3.]);
        add_assign(c.view_mut(), b.view());
        assert_eq!(c, array![3., 4., 6.]);
    }

    #[test]
    #[should_panic]
    fn test_length_mismatch_panics() {
        let a = array![1., 2.];
        let b = array![1., 2., 3.];
        let mut out = Array1::zeros(2);
        add(a.view(), b.view(), out.view_mut());
    }

    #[test]
    fn test_division_by_zero_propagates() {
        let a = array![1., 0.];
        let b = array![0., 0.];
        let mut out = Array1::zeros(2);
        div(a.view(), b.view(), out.view_mut());
        assert!(out[0].is_infinite());
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(array![1., 2., 3., 6.].view()), 3.);
        assert!(mean(Array1::<f64>::zeros(0).view()).is_nan());
    }

    #[test]
    fn test_mean_columns() {
        let rows = array![[1., 10.], [3., 20.], [5., 60.]];
        assert_eq!(mean_columns(rows.rows(), 2), array![3., 30.]);
    }

    #[test]
    fn test_max_abs_negative_dominates() {
        assert_eq!(max_abs(array![0.2, -0.9, 0.5].view()), 0.9);
    }

    #[test]
    fn test_max_abs_skips_non_finite() {
        assert_eq!(max_abs(array![f64::NAN, -0.3, f64::INFINITY].view()), 0.3);
        assert!(max_abs(array![f64::NAN, f64::NAN].view()).is_nan());
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(array![0.1, 0.7, 0.7, 0.2].view()), Some(1));
        assert_eq!(argmax(array![f64::NAN, 0.1, f64::INFINITY].view()), Some(1));
        assert_eq!(argmax(array![f64::NAN].view()), None);
    }
}
