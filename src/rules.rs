//! Two-tier rule resolution: exact `(primary, secondary)` rules with a
//! per-primary wildcard fallback.
//!
//! The same table shape serves service durations keyed by
//! `(call_type, product_group)` and technician eligibility keyed by
//! `(call_type, competency)`; each is built from its own source rows.

use std::collections::{BTreeSet, HashMap};

/// Where a source row lands in a [`RuleTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKey {
    Exact { primary: String, secondary: String },
    Wildcard { primary: String },
}

impl RuleKey {
    /// A secondary value containing `marker` makes the rule a wildcard.
    pub fn classify(primary: impl Into<String>, secondary: impl Into<String>, marker: char) -> Self {
        let secondary = secondary.into();
        if secondary.contains(marker) {
            RuleKey::Wildcard {
                primary: primary.into(),
            }
        } else {
            RuleKey::Exact {
                primary: primary.into(),
                secondary,
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleTable<V> {
    exact: HashMap<(String, String), V>,
    wildcard: HashMap<String, V>,
    skipped: usize,
}

impl<V> Default for RuleTable<V> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            wildcard: HashMap::new(),
            skipped: 0,
        }
    }
}

impl<V> RuleTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from source rows.
    ///
    /// Rows whose value cannot be extracted are skipped and counted. Among
    /// wildcard rows sharing a primary key the first one in row order wins;
    /// a repeated exact key keeps the last row.
    pub fn from_rows<R>(
        rows: impl IntoIterator<Item = R>,
        key: impl Fn(&R) -> RuleKey,
        value: impl Fn(&R) -> Option<V>,
    ) -> Self {
        let mut table = Self::new();
        for row in rows {
            match value(&row) {
                Some(v) => table.insert(key(&row), v),
                None => table.skipped += 1,
            }
        }
        table
    }

    pub fn insert(&mut self, key: RuleKey, value: V) {
        match key {
            RuleKey::Exact { primary, secondary } => {
                self.exact.insert((primary, secondary), value);
            }
            RuleKey::Wildcard { primary } => {
                self.wildcard.entry(primary).or_insert(value);
            }
        }
    }

    /// Exact match if present, else the wildcard for `primary`.
    pub fn lookup(&self, primary: &str, secondary: &str) -> Option<&V> {
        self.exact_rule(primary, secondary)
            .or_else(|| self.wildcard.get(primary))
    }

    /// Every rule applying to the pair, exact first.
    pub fn matching<'a>(
        &'a self,
        primary: &str,
        secondary: &str,
    ) -> impl Iterator<Item = &'a V> + use<'a, V> {
        self.exact_rule(primary, secondary)
            .into_iter()
            .chain(self.wildcard.get(primary))
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exact_rule(&self, primary: &str, secondary: &str) -> Option<&V> {
        // HashMap<(String, String), _> cannot be queried with borrowed halves.
        self.exact
            .get(&(primary.to_string(), secondary.to_string()))
    }
}

impl<T: Ord> RuleTable<BTreeSet<T>> {
    /// Build a table where every key collects the values of all its rows,
    /// e.g. every technician holding a competency.
    pub fn grouped<R>(
        rows: impl IntoIterator<Item = R>,
        key: impl Fn(&R) -> Option<RuleKey>,
        value: impl Fn(&R) -> Option<T>,
    ) -> Self {
        let mut table = Self::new();
        for row in rows {
            let (Some(k), Some(v)) = (key(&row), value(&row)) else {
                table.skipped += 1;
                continue;
            };
            let bucket = match k {
                RuleKey::Exact { primary, secondary } => {
                    table.exact.entry((primary, secondary)).or_default()
                }
                RuleKey::Wildcard { primary } => table.wildcard.entry(primary).or_default(),
            };
            bucket.insert(v);
        }
        table
    }
}
