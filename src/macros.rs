#![macro_use]

// Dual number arithmetic with an `f64` right-hand side.
// Shifts leave tangents alone; scalings apply to every tangent.

macro_rules! impl_dual_shift_by_f64 {
    ($op: ident, $fn: ident) => {
        impl<T: Scalar> std::ops::$op<f64> for Dual<T> {
            type Output = Self;
            fn $fn(self, value: f64) -> Self::Output {
                Self {
                    re: std::ops::$op::$fn(self.re, value),
                    eps: self.eps,
                }
            }
        }
    };
}

macro_rules! impl_dual_scale_by_f64 {
    ($op: ident, $fn: ident) => {
        impl<T: Scalar> std::ops::$op<f64> for Dual<T> {
            type Output = Self;
            fn $fn(self, value: f64) -> Self::Output {
                Self {
                    re: std::ops::$op::$fn(self.re, value),
                    eps: self
                        .eps
                        .into_iter()
                        .map(|e| std::ops::$op::$fn(e, value))
                        .collect(),
                }
            }
        }
    };
}

// `f64 op Dual` for the operators where the left operand is commonly a constant.
macro_rules! impl_f64_lhs_dual_op {
    ($op: ident, $fn: ident) => {
        impl<T: Scalar> std::ops::$op<Dual<T>> for f64 {
            type Output = Dual<T>;
            fn $fn(self, value: Dual<T>) -> Self::Output {
                std::ops::$op::$fn(Dual::<T>::constant(self), value)
            }
        }
    };
}
