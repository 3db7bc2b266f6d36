//! Lessons at school about smoking, drinking, drugs and e-cigarettes.

use sdd_model::{BinaryConvention, ColumnKind};

use crate::recode::{any_of, count_of};
use crate::registry::{Derivation, DerivationRegistry, Theme, names};

/// Had a lesson on the topic in the last year: 1 yes, 2 no.
const LESSONS: [&str; 4] = ["lssmk", "lsalc", "lsdrg", "lsec"];

pub(crate) fn register(registry: &mut DerivationRegistry) {
    registry.register(Derivation::row_wise(
        "dlsany",
        Theme::Lessons,
        names(&LESSONS),
        ColumnKind::Discrete,
        |row| any_of(row, |member| member.is(1), BinaryConvention::ZeroOne),
    ));
    registry.register(Derivation::row_wise(
        "dlsnum",
        Theme::Lessons,
        names(&LESSONS),
        ColumnKind::Discrete,
        |row| count_of(row, |member| member.is(1)),
    ));
}
