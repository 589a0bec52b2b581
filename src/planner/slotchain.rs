//! Slot-chain validation.
//!
//! A slot-chain must start at the child's class and end at the parent's
//! class. It names only known classes, each at most once, and every pair of
//! consecutive classes must be linked by one of the dependency's join
//! predicates.

use crate::model::{Aggregator, Attribute, Dependency, Prm};

use super::QueryError;

/// Check a dependency before any SQL is built for it. Returns the resolved
/// aggregator, if one is declared.
pub fn validate(
    prm: &Prm,
    dep: &Dependency,
    child: &Attribute,
    parent: &Attribute,
) -> Result<Option<Aggregator>, QueryError> {
    let name = dep.name();
    let chain = &dep.slotchain;

    let (first, last) = match (chain.first(), chain.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(QueryError::EmptySlotchain { dependency: name }),
    };

    if let Some(unknown) = chain.iter().find(|c| prm.class(c).is_none()) {
        return Err(QueryError::UnknownClass {
            dependency: name,
            class: unknown.clone(),
        });
    }
    for (i, class) in chain.iter().enumerate() {
        if chain[..i].contains(class) {
            return Err(QueryError::RepeatedClass {
                dependency: name,
                class: class.clone(),
            });
        }
    }
    if *first != child.class {
        return Err(QueryError::SlotchainStart {
            dependency: name,
            expected: child.class.clone(),
            found: first.clone(),
        });
    }
    if *last != parent.class {
        return Err(QueryError::SlotchainEnd {
            dependency: name,
            expected: parent.class.clone(),
            found: last.clone(),
        });
    }

    if chain.len() > 1 && dep.joins.is_empty() {
        return Err(QueryError::MissingJoins { dependency: name });
    }

    for join in &dep.joins {
        for table in [&join.left.table, &join.right.table] {
            if !chain.contains(table) {
                return Err(QueryError::JoinOutsideSlotchain {
                    dependency: name,
                    join: join.to_string(),
                    table: table.clone(),
                });
            }
        }
    }

    for pair in chain.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if !dep.joins.iter().any(|j| j.connects(from, to)) {
            return Err(QueryError::DisconnectedSlotchain {
                dependency: name,
                from: from.clone(),
                to: to.clone(),
            });
        }
    }

    dep.aggregator
        .as_deref()
        .map(|agg| {
            agg.parse::<Aggregator>()
                .map_err(|source| QueryError::UnknownAggregator {
                    dependency: name.clone(),
                    source,
                })
        })
        .transpose()
}
