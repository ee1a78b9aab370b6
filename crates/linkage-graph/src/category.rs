//! Expression categories.
//!
//! Categories drive extraction and pruning: a code generator asks for "all
//! sensors" or "all state derivatives" and receives exactly those equations
//! plus whatever they depend on. An expression can belong to several
//! categories at once, so membership is a small bit set.

use std::fmt;
use std::ops::BitOr;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// Role of an expression in the generated model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Ordinary intermediate quantity (kinematics, generated temporaries).
    Variable,
    /// Model constant or quantity derived only from constants.
    Parameter,
    /// Generalized position or velocity.
    State,
    /// Time derivative of a state.
    DerivativeOfState,
    /// Measured output.
    Sensor,
    /// Quantity the model author asked to see.
    UserExpression,
    /// Product of a kinematic loop (Bvu, b′, dependent coordinates).
    LoopInternal,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Variable,
        Category::Parameter,
        Category::State,
        Category::DerivativeOfState,
        Category::Sensor,
        Category::UserExpression,
        Category::LoopInternal,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Non-ordered set of categories.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);

    pub fn all() -> Self {
        Category::ALL.into_iter().collect()
    }

    pub fn with(self, category: Category) -> Self {
        CategorySet(self.0 | category.bit())
    }

    pub fn contains(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn intersects(self, other: CategorySet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: CategorySet) -> Self {
        CategorySet(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if `category` is the only member.
    pub fn is_only(self, category: Category) -> bool {
        self.0 == category.bit()
    }

    pub fn iter(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl From<Category> for CategorySet {
    fn from(category: Category) -> Self {
        CategorySet(category.bit())
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        iter.into_iter().fold(CategorySet::EMPTY, CategorySet::with)
    }
}

impl BitOr for Category {
    type Output = CategorySet;
    fn bitor(self, rhs: Category) -> CategorySet {
        CategorySet::from(self).with(rhs)
    }
}

impl BitOr<Category> for CategorySet {
    type Output = CategorySet;
    fn bitor(self, rhs: Category) -> CategorySet {
        self.with(rhs)
    }
}

impl BitOr for CategorySet {
    type Output = CategorySet;
    fn bitor(self, rhs: CategorySet) -> CategorySet {
        self.union(rhs)
    }
}

impl fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        for (i, category) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{category}")?;
        }
        Ok(())
    }
}

impl Serialize for CategorySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for category in self.iter() {
            seq.serialize_element(&category)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let set = Category::Sensor | Category::State;
        assert!(set.contains(Category::Sensor));
        assert!(!set.contains(Category::Parameter));
        assert!(set.intersects(Category::State.into()));
        assert!(!set.intersects(Category::LoopInternal.into()));
        assert!(CategorySet::EMPTY.is_empty());
        assert!(CategorySet::from(Category::Variable).is_only(Category::Variable));
        assert!(!set.is_only(Category::Sensor));
    }

    #[test]
    fn test_display_order_is_stable() {
        let set = Category::Sensor | Category::State;
        assert_eq!(set.to_string(), "State|Sensor");
        assert_eq!(CategorySet::all().iter().count(), Category::ALL.len());
    }
}
