//! Lazy cross product of settings axes.

use std::collections::BTreeMap;
use std::iter::FusedIterator;

use matbench_core::{SettingValue, Settings};

/// Iterator over every combination of a set of settings axes.
///
/// Keys are visited in lexicographic order and values in declared order; the
/// last key varies fastest. Only the current odometer position is kept in
/// memory, so arbitrarily large products can be walked.
#[derive(Debug, Clone)]
pub struct Combinations {
    names: Vec<String>,
    axes: Vec<Vec<SettingValue>>,
    cursor: Vec<usize>,
    total: usize,
    remaining: usize,
}

impl Combinations {
    /// Builds the product of `axes`. An empty axis yields no combination;
    /// no axes at all yield one empty combination.
    pub fn new(axes: BTreeMap<String, Vec<SettingValue>>) -> Self {
        let (names, axes): (Vec<_>, Vec<_>) = axes.into_iter().unzip();
        let total = axes
            .iter()
            .fold(1usize, |acc, values| acc.saturating_mul(values.len()));
        Self {
            cursor: vec![0; names.len()],
            names,
            axes,
            total,
            remaining: total,
        }
    }

    /// Number of combinations in the full product.
    pub fn total(&self) -> usize {
        self.total
    }

    fn current(&self) -> Settings {
        self.names
            .iter()
            .zip(&self.axes)
            .zip(&self.cursor)
            .map(|((name, values), &idx)| (name.clone(), values[idx].clone()))
            .collect()
    }

    fn advance(&mut self) {
        for (position, values) in self.cursor.iter_mut().zip(&self.axes).rev() {
            *position += 1;
            if *position < values.len() {
                return;
            }
            *position = 0;
        }
    }
}

impl Iterator for Combinations {
    type Item = Settings;

    fn next(&mut self) -> Option<Settings> {
        if self.remaining == 0 {
            return None;
        }
        let combination = self.current();
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(combination)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations {}

impl FusedIterator for Combinations {}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes(spec: &[(&str, &[i64])]) -> BTreeMap<String, Vec<SettingValue>> {
        spec.iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().copied().map(SettingValue::Int).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn last_key_varies_fastest() {
        let keys: Vec<String> = Combinations::new(axes(&[("b", &[1, 2]), ("a", &[1, 2])]))
            .map(|settings| settings.key())
            .collect();
        assert_eq!(keys, vec!["a=1|b=1", "a=1|b=2", "a=2|b=1", "a=2|b=2"]);
    }

    #[test]
    fn degenerate_products() {
        assert_eq!(Combinations::new(axes(&[("a", &[])])).count(), 0);
        let empty: Vec<Settings> = Combinations::new(BTreeMap::new()).collect();
        assert_eq!(empty, vec![Settings::new()]);
    }
}
