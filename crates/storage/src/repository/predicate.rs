use super::entity::{Entity, Field};

/// Filter expression over one entity's typed fields.
#[derive(Debug, Clone)]
pub enum Predicate<E: Entity> {
    All,
    Eq(E::Field),
    And(Vec<Predicate<E>>),
    Or(Vec<Predicate<E>>),
    Not(Box<Predicate<E>>),
}

/// Matches rows whose field equals the given value.
pub fn eq<F: Field>(field: F) -> Predicate<F::Entity> {
    Predicate::Eq(field)
}

pub fn all<E: Entity>() -> Predicate<E> {
    Predicate::All
}

impl<E: Entity> Predicate<E> {
    pub fn and(self, other: Predicate<E>) -> Self {
        match (self, other) {
            (Predicate::All, p) | (p, Predicate::All) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, Predicate::And(mut right)) => {
                right.insert(0, p);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    pub fn or(self, other: Predicate<E>) -> Self {
        match (self, other) {
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), p) => {
                left.push(p);
                Predicate::Or(left)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            p => Predicate::Not(Box::new(p)),
        }
    }

    pub fn evaluate(&self, row: &E) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(field) => row.matches(field),
            Predicate::And(parts) => parts.iter().all(|p| p.evaluate(row)),
            Predicate::Or(parts) => parts.iter().any(|p| p.evaluate(row)),
            Predicate::Not(inner) => !inner.evaluate(row),
        }
    }
}
