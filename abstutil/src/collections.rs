use std::collections::BTreeMap;

/// Accumulates a floating point total per key. Used for things like "how much shared boundary does
/// each neighbor have."
#[derive(Clone, Debug, PartialEq)]
pub struct Counter<T: Ord + PartialEq + Clone> {
    map: BTreeMap<T, f64>,
    sum: f64,
}

impl<T: Ord + PartialEq + Clone> Counter<T> {
    pub fn new() -> Counter<T> {
        Counter {
            map: BTreeMap::new(),
            sum: 0.0,
        }
    }

    pub fn add(&mut self, val: T, amount: f64) -> f64 {
        let entry = self.map.entry(val).or_insert(0.0);
        *entry += amount;
        self.sum += amount;
        *entry
    }

    pub fn inc(&mut self, val: T) -> f64 {
        self.add(val, 1.0)
    }

    pub fn get(&self, val: T) -> f64 {
        self.map.get(&val).cloned().unwrap_or(0.0)
    }

    /// The key with the largest total. Ties go to the smallest key, so results are deterministic.
    pub fn max_key(&self) -> Option<T> {
        let mut best: Option<(&T, f64)> = None;
        for (key, total) in &self.map {
            match best {
                Some((_, best_total)) if *total <= best_total => {}
                _ => {
                    best = Some((key, *total));
                }
            }
        }
        best.map(|(key, _)| key.clone())
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn borrow(&self) -> &BTreeMap<T, f64> {
        &self.map
    }

    pub fn consume(self) -> BTreeMap<T, f64> {
        self.map
    }
}

impl<T: Ord + PartialEq + Clone> Default for Counter<T> {
    fn default() -> Self {
        Self::new()
    }
}
