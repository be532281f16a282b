#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, PartialOrd, Debug)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl Complex<f32> {
    pub fn norm_sqr(&self) -> f32 {
        self.re * self.re + self.im * self.im
    }
}

/// Normalized sample handed to consumers, both components in [-128/127, 1]
pub type ComplexSample = Complex<f32>;
