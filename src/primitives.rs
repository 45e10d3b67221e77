// ===============================
// src/primitives.rs
// ===============================
//
// Building block kecil untuk node graph:
// - Sum<T>    : fold akumulasi (satu state cell)
// - Latest<T> : simpan nilai terakhir
// - multiply / add / negate : zip stateless dua input
//
use std::ops::{Add, Mul, Neg};

use serde::Serialize;

/// Penjumlahan yang bisa gagal (integer overflow). Float tidak pernah gagal.
pub trait Summable: Copy + Default {
    fn checked_sum(self, rhs: Self) -> Option<Self>;
}

impl Summable for i64 {
    fn checked_sum(self, rhs: Self) -> Option<Self> { self.checked_add(rhs) }
}

impl Summable for f64 {
    fn checked_sum(self, rhs: Self) -> Option<Self> { Some(self + rhs) }
}

/// Running sum over a stream of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Sum<T> {
    total: T,
}

impl<T: Summable> Sum<T> {
    pub fn new(initial: T) -> Self {
        Self { total: initial }
    }

    /// Adds `x` and returns the new total, or `None` on overflow (total unchanged).
    pub fn add(&mut self, x: T) -> Option<T> {
        let next = self.total.checked_sum(x)?;
        self.total = next;
        Some(next)
    }

    pub fn value(&self) -> T {
        self.total
    }
}

impl Sum<f64> {
    /// Float fold tidak pernah gagal: overflow jadi ±inf, NaN tetap NaN.
    pub fn accumulate(&mut self, x: f64) -> f64 {
        self.total += x;
        self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Latest<T> {
    value: T,
}

impl<T: Copy> Latest<T> {
    pub fn new(initial: T) -> Self {
        Self { value: initial }
    }

    pub fn set(&mut self, value: T) -> T {
        self.value = value;
        value
    }

    pub fn value(&self) -> T {
        self.value
    }
}

pub fn multiply<T: Mul<Output = T>>(a: T, b: T) -> T {
    a * b
}

pub fn add<T: Add<Output = T>>(a: T, b: T) -> T {
    a + b
}

pub fn negate<T: Neg<Output = T>>(a: T) -> T {
    -a
}
