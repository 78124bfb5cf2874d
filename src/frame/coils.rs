// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Coil;

/// A borrowed view over bit-packed coil data.
///
/// Bit order is little-endian within each byte: querying 14 coils yields
/// 2 bytes where the first byte holds coils 0-7 (bit 0 = coil 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coils<'c> {
    data: &'c [u8],
    quantity: usize,
}

impl<'c> Coils<'c> {
    /// View `quantity` coils packed into `data`.
    #[must_use]
    pub const fn new(data: &'c [u8], quantity: usize) -> Self {
        Self { data, quantity }
    }

    /// Quantity of coils
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }

    /// Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Get a specific coil.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Coil> {
        if idx >= self.quantity {
            return None;
        }
        Some((self.data[idx / 8] >> (idx % 8)) & 0b1 > 0)
    }
}

/// Coils iterator.
#[derive(Debug, Clone, Copy)]
pub struct CoilsIter<'c> {
    cnt: usize,
    coils: Coils<'c>,
}

impl Iterator for CoilsIter<'_> {
    type Item = Coil;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.coils.get(self.cnt);
        self.cnt += 1;
        result
    }
}

impl<'c> IntoIterator for Coils<'c> {
    type Item = Coil;
    type IntoIter = CoilsIter<'c>;

    fn into_iter(self) -> Self::IntoIter {
        CoilsIter {
            cnt: 0,
            coils: self,
        }
    }
}
