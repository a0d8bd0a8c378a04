//! Boilerplate generator for arithmetic on single-field newtypes.
//!
//! ```rust,ignore
//! op!(binary Money, Add, add);
//! op!(inplace Money, AddAssign, add_assign);
//! op!(unary Money, Neg, neg);
//! ```

#[macro_export]
macro_rules! op {
    (binary $type:ty, $trt:ident, $method:ident) => {
        impl std::ops::$trt for $type {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trt::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $type:ty, $trt:ident, $method:ident) => {
        impl std::ops::$trt for $type {
            fn $method(&mut self, rhs: Self) {
                std::ops::$trt::$method(&mut self.0, rhs.0)
            }
        }
    };
    (unary $type:ty, $trt:ident, $method:ident) => {
        impl std::ops::$trt for $type {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self(std::ops::$trt::$method(self.0))
            }
        }
    };
}
